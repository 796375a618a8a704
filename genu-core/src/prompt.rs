use std::path::Path;

use crate::tools::upload::UPLOAD_TOOL_NAME;

/// File-output instructions appended to every system prompt
pub fn fixed_system_prompt(workspace: &Path) -> String {
    let ws = workspace.display();
    format!(
        "## About File Output
- You are running on AWS Bedrock AgentCore. Therefore, when writing files, always write them under `{ws}`.
- Similarly, if you need a workspace, please use the `{ws}` directory. Do not ask the user about their current workspace. It's always `{ws}`.
- Also, users cannot directly access files written under `{ws}`. So when submitting these files to users, *always upload them to S3 using the `{UPLOAD_TOOL_NAME}` tool and provide the S3 URL*. The S3 URL must be included in the final output.
- If the output file is an image file, the S3 URL output must be in Markdown format.
"
    )
}

/// User prompt first, fixed instructions after it
pub fn compose_system_prompt(user_system_prompt: Option<&str>, workspace: &Path) -> String {
    let fixed = fixed_system_prompt(workspace);
    match user_system_prompt {
        Some(user) if !user.is_empty() => format!("{}\n{}", user, fixed),
        _ => fixed,
    }
}
