//! `colonylab prompts`: Inspect and render prompt templates.

use anyhow::Context;
use clap::Subcommand;
use colonylab_config::Settings;
use colonylab_prompts::{PromptStore, PromptVars};
use std::path::Path;

#[derive(Debug, Subcommand)]
pub enum PromptsCommand {
    /// List prompt names and their variables
    List,

    /// Print a template as written
    Show { name: String },

    /// Render a template with variables
    Render {
        name: String,

        /// Template variable, repeatable
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,
    },
}

pub fn run(config: Option<&Path>, command: PromptsCommand) -> anyhow::Result<()> {
    let settings = Settings::load(config).context("Failed to load config")?;
    let store = PromptStore::load_or_embedded(settings.prompts_path.as_deref())?;

    match command {
        PromptsCommand::List => {
            for name in store.names() {
                let placeholders = store.placeholders(&name)?;
                if placeholders.is_empty() {
                    println!("{name}");
                } else {
                    println!("{name}  ({})", placeholders.join(", "));
                }
            }
        }
        PromptsCommand::Show { name } => println!("{}", store.source(&name)?),
        PromptsCommand::Render { name, vars } => {
            println!("{}", render(&store, &name, vars)?);
        }
    }

    Ok(())
}

fn render(store: &PromptStore, name: &str, vars: Vec<(String, String)>) -> anyhow::Result<String> {
    let vars: PromptVars = vars.into_iter().collect();
    Ok(store.render(name, &vars)?)
}

/// Parse `key=value`; the value may itself contain `=`.
fn parse_var(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_splits_on_first_equals() {
        assert_eq!(
            parse_var("tool_results=a=b").unwrap(),
            ("tool_results".to_string(), "a=b".to_string())
        );
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn render_requires_every_variable() {
        let store = PromptStore::embedded().unwrap();
        assert!(render(&store, "colony_analyzer", vec![]).is_err());

        let text = render(
            &store,
            "colony_analyzer",
            vec![("tool_results".into(), "two morphotypes".into())],
        )
        .unwrap();
        assert!(text.contains("two morphotypes"));
    }
}
