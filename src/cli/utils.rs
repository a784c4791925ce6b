use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::database::models::User;
use crate::database::{Repository, RowStore};
use crate::filter::FilterData;

/// Print a success message, merging `data` into the JSON form
pub fn output_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({ "success": true, "message": message });
            if let (Some(Value::Object(extra)), Some(out)) = (data, response.as_object_mut()) {
                out.extend(extra);
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => println!("✓ {}", message),
    }
    Ok(())
}

/// Look a user up by username
pub async fn find_user(store: std::sync::Arc<dyn RowStore>, username: &str) -> anyhow::Result<User> {
    Repository::<User>::new(store)
        .select_one(FilterData::where_(json!({ "username": username })))
        .await?
        .ok_or_else(|| anyhow::anyhow!("No user named '{}'", username))
}
