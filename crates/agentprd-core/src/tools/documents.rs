//! PRD, note and work-context tools backed by the key-value store.

use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::{ToolContext, slugify};
use crate::error::ToolError;
use crate::kv::{KvStore, namespaces};

fn required_str<'a>(tool: &str, args: &'a Value, name: &str) -> Result<&'a str, ToolError> {
    args.get(name)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("missing required parameter: {name}"),
        })
}

fn slug_arg(tool: &str, args: &Value) -> Result<String, ToolError> {
    let title = required_str(tool, args, "title")?;
    let slug = slugify(title);
    if slug.is_empty() {
        return Err(ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("title '{title}' has no usable characters"),
        });
    }
    Ok(slug)
}

/// Save a titled document under `namespace/<slug>`.
async fn save_document(
    tool: &str,
    namespace: &str,
    args: &Value,
    kv: &dyn KvStore,
) -> Result<Value, ToolError> {
    let slug = slug_arg(tool, args)?;
    let title = required_str(tool, args, "title")?;
    let content = required_str(tool, args, "content")?;

    let doc = json!({
        "title": title,
        "slug": slug,
        "content": content,
        "updatedAt": Utc::now(),
    });
    kv.set(namespace, &slug, doc).await?;
    debug!(namespace, slug = %slug, bytes = content.len(), "Document saved");
    Ok(json!({ "status": "saved", "slug": slug }))
}

async fn load_document(
    tool: &str,
    namespace: &str,
    label: &str,
    args: &Value,
    kv: &dyn KvStore,
) -> Result<Value, ToolError> {
    let slug = slug_arg(tool, args)?;
    let entry = kv.get(namespace, &slug).await?;
    match entry.data {
        Some(doc) if entry.exists => Ok(doc),
        _ => Err(ToolError::NotFound(format!("{label} '{slug}'"))),
    }
}

#[instrument(skip(args, kv))]
pub async fn exec_store_prd(args: &Value, kv: &dyn KvStore) -> Result<Value, ToolError> {
    save_document("store_prd", namespaces::PRDS, args, kv).await
}

#[instrument(skip(args, kv))]
pub async fn exec_get_prd(args: &Value, kv: &dyn KvStore) -> Result<Value, ToolError> {
    load_document("get_prd", namespaces::PRDS, "PRD", args, kv).await
}

#[instrument(skip(args, kv))]
pub async fn exec_save_note(args: &Value, kv: &dyn KvStore) -> Result<Value, ToolError> {
    save_document("save_note", namespaces::NOTES, args, kv).await
}

#[instrument(skip(args, kv))]
pub async fn exec_get_note(args: &Value, kv: &dyn KvStore) -> Result<Value, ToolError> {
    load_document("get_note", namespaces::NOTES, "note", args, kv).await
}

#[instrument(skip(args, kv))]
pub async fn exec_delete_note(args: &Value, kv: &dyn KvStore) -> Result<Value, ToolError> {
    let slug = slug_arg("delete_note", args)?;
    if !kv.get(namespaces::NOTES, &slug).await?.exists {
        return Err(ToolError::NotFound(format!("note '{slug}'")));
    }
    kv.delete(namespaces::NOTES, &slug).await?;
    Ok(json!({ "status": "deleted", "slug": slug }))
}

#[instrument(skip(args, kv, ctx))]
pub async fn exec_set_work_context(
    args: &Value,
    kv: &dyn KvStore,
    ctx: &ToolContext,
) -> Result<Value, ToolError> {
    let context = required_str("set_work_context", args, "context")?;
    let key = ctx.context_key();
    kv.set(
        namespaces::CONTEXTS,
        key,
        json!({ "context": context, "updatedAt": Utc::now() }),
    )
    .await?;
    Ok(json!({ "status": "saved" }))
}

#[instrument(skip(kv, ctx))]
pub async fn exec_get_work_context(kv: &dyn KvStore, ctx: &ToolContext) -> Result<Value, ToolError> {
    let entry = kv.get(namespaces::CONTEXTS, ctx.context_key()).await?;
    // A missing context is a normal answer, not an error
    Ok(entry.data.unwrap_or_else(|| json!({ "context": null })))
}
