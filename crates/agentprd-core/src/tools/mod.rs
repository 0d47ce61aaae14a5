// Product-management tools the model can invoke.
//
// Tools read and write PRDs, notes and the user's work context in the
// key-value store. Mutating tools are held back when the request asks for
// approval mode; the turn then reports `needsApproval`.

mod documents;
mod params;

pub use params::*;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::kv::KvStore;
use crate::providers::ToolDefinition;

use documents::{
    exec_delete_note, exec_get_note, exec_get_prd, exec_get_work_context, exec_save_note,
    exec_set_work_context, exec_store_prd,
};

/// Key used for work context when the request carries no user id.
pub const DEFAULT_CONTEXT_KEY: &str = "default";

// ── Tool definitions ────────────────────────────────────────────────────────

/// JSON-Schema-like parameter definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParam {
    pub name: String,
    pub description: String,
    /// JSON Schema type: "string", "integer", "boolean", "array", "object".
    #[serde(rename = "type")]
    pub param_type: String,
    pub required: bool,
}

/// A tool that the agent can invoke.
#[derive(Debug, Clone, Copy)]
pub struct ToolDef {
    pub name: &'static str,
    pub description: &'static str,
    /// Whether the tool changes stored state.
    pub mutating: bool,
}

pub const STORE_PRD: ToolDef = ToolDef {
    name: "store_prd",
    description: "Save or update a product requirements document.",
    mutating: true,
};

pub const GET_PRD: ToolDef = ToolDef {
    name: "get_prd",
    description: "Read a previously saved product requirements document.",
    mutating: false,
};

pub const SAVE_NOTE: ToolDef = ToolDef {
    name: "save_note",
    description: "Save a short note for later reference.",
    mutating: true,
};

pub const GET_NOTE: ToolDef = ToolDef {
    name: "get_note",
    description: "Read a saved note.",
    mutating: false,
};

pub const DELETE_NOTE: ToolDef = ToolDef {
    name: "delete_note",
    description: "Delete a saved note.",
    mutating: true,
};

pub const SET_WORK_CONTEXT: ToolDef = ToolDef {
    name: "set_work_context",
    description: "Remember what the user is currently working on.",
    mutating: true,
};

pub const GET_WORK_CONTEXT: ToolDef = ToolDef {
    name: "get_work_context",
    description: "Recall what the user is currently working on.",
    mutating: false,
};

/// Return all available tools.
pub fn all_tools() -> &'static [ToolDef] {
    &[
        STORE_PRD,
        GET_PRD,
        SAVE_NOTE,
        GET_NOTE,
        DELETE_NOTE,
        SET_WORK_CONTEXT,
        GET_WORK_CONTEXT,
    ]
}

pub fn find_tool(name: &str) -> Option<&'static ToolDef> {
    all_tools().iter().find(|t| t.name == name)
}

fn resolve_params(tool: &ToolDef) -> Vec<ToolParam> {
    match tool.name {
        "store_prd" => store_prd_params(),
        "get_prd" => get_prd_params(),
        "save_note" => save_note_params(),
        "get_note" => get_note_params(),
        "delete_note" => delete_note_params(),
        "set_work_context" => set_work_context_params(),
        "get_work_context" => get_work_context_params(),
        _ => Vec::new(),
    }
}

/// Parameters for a tool, building a JSON Schema `properties` / `required`.
fn params_to_json_schema(params: &[ToolParam]) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for p in params {
        properties.insert(
            p.name.clone(),
            json!({ "type": p.param_type, "description": p.description }),
        );
        if p.required {
            required.push(json!(p.name));
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Definitions of every tool in the form providers advertise to the model.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    all_tools()
        .iter()
        .map(|t| ToolDefinition {
            name: t.name.to_string(),
            description: t.description.to_string(),
            parameters: params_to_json_schema(&resolve_params(t)),
        })
        .collect()
}

/// Turn a title into a storage key: lowercase ASCII alphanumerics separated
/// by single dashes.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

// ── Execution ───────────────────────────────────────────────────────────────

/// Per-request execution context.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub session_id: String,
    pub user_id: Option<String>,
    pub approval_mode: bool,
}

impl ToolContext {
    fn context_key(&self) -> &str {
        self.user_id
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_CONTEXT_KEY)
    }
}

/// Result of a tool invocation as reported to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub result: Value,
    /// The tool was held back pending user approval.
    pub pending_approval: bool,
}

impl ToolOutcome {
    fn done(result: Value) -> Self {
        Self {
            result,
            pending_approval: false,
        }
    }
}

pub struct ToolRegistry {
    kv: Arc<dyn KvStore>,
}

impl ToolRegistry {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        tool_definitions()
    }

    /// Execute a tool. Failures become `{ "error": … }` results so the model
    /// can recover; they never abort the turn.
    pub async fn execute(&self, name: &str, args: &Value, ctx: &ToolContext) -> ToolOutcome {
        let Some(tool) = find_tool(name) else {
            warn!(tool = name, "Model requested an unknown tool");
            return ToolOutcome::done(json!({ "error": ToolError::Unknown(name.to_string()).to_string() }));
        };

        if tool.mutating && ctx.approval_mode {
            debug!(tool = name, session = %ctx.session_id, "Holding mutating tool for approval");
            return ToolOutcome {
                result: json!({ "status": "pending_approval", "tool": name, "args": args }),
                pending_approval: true,
            };
        }

        match self.dispatch(tool, args, ctx).await {
            Ok(result) => ToolOutcome::done(result),
            Err(e) => {
                debug!(tool = name, error = %e, "Tool returned an error");
                ToolOutcome::done(json!({ "error": e.to_string() }))
            }
        }
    }

    async fn dispatch(
        &self,
        tool: &ToolDef,
        args: &Value,
        ctx: &ToolContext,
    ) -> Result<Value, ToolError> {
        let kv = self.kv.as_ref();
        match tool.name {
            "store_prd" => exec_store_prd(args, kv).await,
            "get_prd" => exec_get_prd(args, kv).await,
            "save_note" => exec_save_note(args, kv).await,
            "get_note" => exec_get_note(args, kv).await,
            "delete_note" => exec_delete_note(args, kv).await,
            "set_work_context" => exec_set_work_context(args, kv, ctx).await,
            "get_work_context" => exec_get_work_context(kv, ctx).await,
            other => Err(ToolError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKvStore;

    fn registry() -> ToolRegistry {
        ToolRegistry::new(Arc::new(MemoryKvStore::new()))
    }

    fn ctx() -> ToolContext {
        ToolContext {
            session_id: "s1".into(),
            user_id: Some("alice".into()),
            approval_mode: false,
        }
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  Checkout Redesign: v2!  "), "checkout-redesign-v2");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn definitions_carry_required_params() {
        let defs = tool_definitions();
        assert_eq!(defs.len(), all_tools().len());
        let store = defs.iter().find(|d| d.name == "store_prd").unwrap();
        assert_eq!(store.parameters["type"], "object");
        assert_eq!(store.parameters["required"], json!(["title", "content"]));
        let get_ctx = defs.iter().find(|d| d.name == "get_work_context").unwrap();
        assert_eq!(get_ctx.parameters["required"], json!([]));
    }

    #[tokio::test]
    async fn prd_round_trip_by_title() {
        let reg = registry();
        let out = reg
            .execute(
                "store_prd",
                &json!({"title": "Checkout Redesign", "content": "# Goals"}),
                &ctx(),
            )
            .await;
        assert_eq!(out.result["slug"], "checkout-redesign");
        assert!(!out.pending_approval);

        let got = reg
            .execute("get_prd", &json!({"title": "checkout redesign"}), &ctx())
            .await;
        assert_eq!(got.result["content"], "# Goals");
        assert_eq!(got.result["title"], "Checkout Redesign");
    }

    #[tokio::test]
    async fn missing_documents_are_error_results() {
        let reg = registry();
        let out = reg.execute("get_note", &json!({"title": "nope"}), &ctx()).await;
        assert!(out.result["error"].as_str().unwrap().contains("not found"));

        let del = reg.execute("delete_note", &json!({"title": "nope"}), &ctx()).await;
        assert!(del.result.get("error").is_some());
    }

    #[tokio::test]
    async fn note_delete_removes_it() {
        let reg = registry();
        reg.execute("save_note", &json!({"title": "Idea", "content": "x"}), &ctx())
            .await;
        let del = reg.execute("delete_note", &json!({"title": "Idea"}), &ctx()).await;
        assert_eq!(del.result["status"], "deleted");
        let got = reg.execute("get_note", &json!({"title": "Idea"}), &ctx()).await;
        assert!(got.result.get("error").is_some());
    }

    #[tokio::test]
    async fn unknown_tool_and_bad_args() {
        let reg = registry();
        let out = reg.execute("launch_rocket", &json!({}), &ctx()).await;
        assert!(out.result["error"].as_str().unwrap().contains("unknown tool"));

        let bad = reg.execute("store_prd", &json!({"title": "x"}), &ctx()).await;
        assert!(bad.result["error"].as_str().unwrap().contains("content"));
    }

    #[tokio::test]
    async fn approval_mode_holds_mutations_only() {
        let reg = registry();
        let approval = ToolContext {
            approval_mode: true,
            ..ctx()
        };
        let held = reg
            .execute("save_note", &json!({"title": "a", "content": "b"}), &approval)
            .await;
        assert!(held.pending_approval);
        assert_eq!(held.result["status"], "pending_approval");

        // Nothing was written
        let got = reg.execute("get_note", &json!({"title": "a"}), &approval).await;
        assert!(!got.pending_approval);
        assert!(got.result.get("error").is_some());
    }

    #[tokio::test]
    async fn work_context_is_per_user() {
        let reg = registry();
        reg.execute("set_work_context", &json!({"context": "Pricing page"}), &ctx())
            .await;
        let mine = reg.execute("get_work_context", &json!({}), &ctx()).await;
        assert_eq!(mine.result["context"], "Pricing page");

        let anon = ToolContext {
            user_id: None,
            ..ctx()
        };
        let theirs = reg.execute("get_work_context", &json!({}), &anon).await;
        assert!(theirs.result["context"].is_null());
    }
}
