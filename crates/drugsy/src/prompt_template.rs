use serde::Serialize;
use tera::{Context, Error as TeraError, Tera};

/// Render one of the embedded prompt templates with the given context.
///
/// Templates live in `src/prompts/` and are compiled in with `include_str!`,
/// so rendering never touches the filesystem.
pub fn render_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    tera.render("inline_template", &context)
}
