use crate::context::{build_tools, load_config};
use crate::output::{print_json, redact_config_for_display};
use anyhow::Result;
use rootcause_tools::ToolDescription;
use std::path::Path;

pub(crate) fn run_tools(cwd: &Path, json_mode: bool) -> Result<()> {
    let cfg = load_config(cwd)?;
    let registry = build_tools(cwd, &cfg)?;
    let tools: Vec<ToolDescription<'_>> = registry.descriptions().collect();
    if json_mode {
        return print_json(&tools);
    }
    if tools.is_empty() {
        println!("No tools configured. Declare command tools under `tools` in .rootcause/settings.json.");
        return Ok(());
    }
    for tool in tools {
        println!("{}: {}", tool.name, tool.description);
        for param in tool.parameters {
            println!(
                "    {} ({}{})  {}",
                param.name,
                param.kind,
                if param.required { ", required" } else { "" },
                param.description
            );
        }
    }
    Ok(())
}

pub(crate) fn run_config(cwd: &Path, json_mode: bool) -> Result<()> {
    let cfg = load_config(cwd)?;
    let display_cfg = redact_config_for_display(&cfg)?;
    if json_mode {
        print_json(&display_cfg)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&display_cfg)?);
    }
    Ok(())
}
