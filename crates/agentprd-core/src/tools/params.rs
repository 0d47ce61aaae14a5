//! Parameter definitions for the product-management tools.
//!
//! Each `*_params()` function returns the parameter list for one tool; the
//! registry turns these into JSON Schema for the model.

use super::ToolParam;

fn string_param(name: &str, description: &str, required: bool) -> ToolParam {
    ToolParam {
        name: name.into(),
        description: description.into(),
        param_type: "string".into(),
        required,
    }
}

pub fn store_prd_params() -> Vec<ToolParam> {
    vec![
        string_param(
            "title",
            "Title of the PRD. Used to derive its storage key, so reuse the \
             same title to update an existing document.",
            true,
        ),
        string_param("content", "Full PRD body in Markdown.", true),
    ]
}

pub fn get_prd_params() -> Vec<ToolParam> {
    vec![string_param("title", "Title (or slug) of the PRD to read.", true)]
}

pub fn save_note_params() -> Vec<ToolParam> {
    vec![
        string_param("title", "Short title for the note.", true),
        string_param("content", "Note body.", true),
    ]
}

pub fn get_note_params() -> Vec<ToolParam> {
    vec![string_param("title", "Title (or slug) of the note to read.", true)]
}

pub fn delete_note_params() -> Vec<ToolParam> {
    vec![string_param("title", "Title (or slug) of the note to delete.", true)]
}

pub fn set_work_context_params() -> Vec<ToolParam> {
    vec![string_param(
        "context",
        "What the user is currently working on: product, goals, open \
         questions. Replaces any previous context.",
        true,
    )]
}

pub fn get_work_context_params() -> Vec<ToolParam> {
    Vec::new()
}
