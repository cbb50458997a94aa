use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    pub instructions: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GenerationConfig {
    pub create_prompt: String,
    pub update_prompt: String,
    pub reference_prompt: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptsConfig {
    pub system: SystemConfig,
    pub generation: GenerationConfig,
}

impl PromptsConfig {
    pub fn load() -> Result<Self> {
        // Try to load from current directory first, then from executable directory
        let config_paths = [
            "prompts.toml",
            "./prompts.toml",
            "../prompts.toml", // In case running from target/debug
        ];

        for path in &config_paths {
            if let Ok(content) = fs::read_to_string(path) {
                return toml::from_str(&content)
                    .with_context(|| format!("Failed to parse prompts.toml from {}", path));
            }
        }

        // If no config file found, return default configuration
        Ok(Self::default())
    }

    pub fn get_system_instructions(&self) -> &str {
        &self.system.instructions
    }

    pub fn get_create_prompt(&self, filename: &str, request: &str) -> String {
        self.generation
            .create_prompt
            .replace("{filename}", filename)
            .replace("{request}", request)
    }

    pub fn get_update_prompt(&self, filename: &str, request: &str, current: &str) -> String {
        self.generation
            .update_prompt
            .replace("{filename}", filename)
            .replace("{request}", request)
            .replace("{current}", current)
    }

    pub fn get_reference_prompt(&self, filename: &str, request: &str, current: &str) -> String {
        self.generation
            .reference_prompt
            .replace("{filename}", filename)
            .replace("{request}", request)
            .replace("{current}", current)
    }
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            system: SystemConfig {
                instructions: r#"You are a coding assistant embedded in the user's editor. You answer questions about code and generate complete files on request.

When you produce the contents of a file, wrap them in a fenced code block whose opening line names the language and the destination path:

```js {file: src/app.js}
const x = 1;
console.log(x);
```

## Rules:
1. Always return the complete contents of a file, never a fragment or an elided version.
2. Only reference paths inside the user's open project folder.
3. Keep explanations outside the code fences, as plain text.
4. One file per code block; use several blocks to change several files.
5. If you are not sure what the user wants, ask before generating files."#
                    .to_string(),
            },
            generation: GenerationConfig {
                create_prompt: r#"Create a new file named {filename}.

Request: {request}

Return the complete contents of {filename} in a single fenced code block whose opening line carries the language and {file: {filename}}. A short explanation outside the block is welcome."#
                    .to_string(),
                update_prompt: r#"Update the file {filename}.

Request: {request}

Current contents of {filename}:

{current}

Return the complete updated contents of {filename} in a single fenced code block tagged {file: {filename}}. Do not elide unchanged sections."#
                    .to_string(),
                reference_prompt: r#"The user is asking about the file {filename}.

{current}

Request: {request}

If the request calls for changes, return the complete new contents of {filename} in a fenced code block tagged {file: {filename}}; otherwise just answer."#
                    .to_string(),
            },
        }
    }
}
