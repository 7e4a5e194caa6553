use anyhow::{bail, Result};
use std::io::Write;

use rootstore::storage::{status, NoticeSeverity, RequestContext, WriteValueRequest};
use rootstore::StorageRegistry;

fn fail(code: u16, message: &str) -> Result<()> {
    bail!("{} (status {})", message, code)
}

pub fn show_roots(registry: &StorageRegistry, json: bool) -> Result<()> {
    let roots = registry.roots();
    if json {
        println!("{}", serde_json::to_string_pretty(&roots)?);
        return Ok(());
    }

    println!("📦 Storage Roots");
    println!("================");
    for meta in &roots {
        let state = if meta.is_ready() { "✅" } else { "❌" };
        let prefix = if meta.prefix().is_empty() { "<none>" } else { meta.prefix() };
        let access = if meta.read_only { " (read-only)" } else { "" };
        println!("{} {} [{}] {}{}", state, prefix, meta.kind(), meta.config.name, access);
        for notice in meta.notices() {
            let marker = match notice.severity {
                NoticeSeverity::Error => "error",
                NoticeSeverity::Warning => "warning",
                NoticeSeverity::Info => "info",
            };
            println!("   {}: {}", marker, notice.text);
        }
    }
    Ok(())
}

pub async fn list(registry: &StorageRegistry, path: &str, json: bool) -> Result<()> {
    let res = registry.list(&RequestContext::background(), path).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&res)?);
    }
    if !status::is_success(res.code) {
        return fail(res.code, &res.message);
    }
    if !json {
        for entry in &res.entries {
            if entry.is_folder {
                println!("{}/", entry.path);
            } else {
                println!("{}\t{} bytes", entry.path, entry.size);
            }
        }
    }
    Ok(())
}

pub async fn cat(registry: &StorageRegistry, path: &str, json: bool) -> Result<()> {
    let res = registry.read(&RequestContext::background(), path).await?;
    let Some(file) = res.file.filter(|_| status::is_success(res.code)) else {
        if json {
            println!("{}", serde_json::json!({"code": res.code, "message": res.message}));
        }
        return fail(res.code, &res.message);
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "path": file.path,
                "size": file.size,
                "hash": file.hash,
                "modified": file.modified,
                "body": String::from_utf8_lossy(&file.body),
            }))?
        );
    } else {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&file.body)?;
        stdout.flush()?;
    }
    Ok(())
}

pub async fn put(registry: &StorageRegistry, path: &str, body: Vec<u8>, json: bool) -> Result<()> {
    let res = registry
        .write(&RequestContext::background(), WriteValueRequest::new(path, body))
        .await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&res)?);
    }
    if !status::is_success(res.code) {
        return fail(res.code, &res.message);
    }
    if !json {
        println!("✅ Stored {}", path);
        if let Some(hash) = &res.hash {
            println!("   sha256: {}", hash);
        }
    }
    Ok(())
}

pub async fn remove(registry: &StorageRegistry, path: &str, json: bool) -> Result<()> {
    let res = registry.delete(&RequestContext::background(), path).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&res)?);
    }
    if !status::is_success(res.code) {
        return fail(res.code, &res.message);
    }
    if !json {
        println!("🗑️  Deleted {}", path);
    }
    Ok(())
}
