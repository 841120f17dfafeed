use crate::config::{AppConfig, SystemNotifyConfig};
use crate::notify::DeliveryStyle;
use anyhow::{anyhow, Result};
use serde_json::{Map, Value};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

pub fn run() -> Result<()> {
    let path = crate::config::config_path();
    let mut root = load_config_value(&path)?;
    let mut dirty = false;

    println!("femtoalarm configure");
    println!("Config path: {}", path.display());
    println!();

    loop {
        println!("Menu:");
        println!("1. Delivery style (system/alternate)");
        println!("2. System notification command");
        println!("3. Scheduler tick and default label");
        println!("4. Data directory");
        println!("5. Show config path");
        println!("6. Save and exit");
        println!("7. Exit without saving");
        print!("Select an option: ");
        io::stdout().flush().ok();

        let choice = read_line()?.trim().to_string();
        println!();

        match choice.as_str() {
            "1" => {
                dirty |= configure_style(&mut root)?;
            }
            "2" => {
                dirty |= configure_system(&mut root)?;
            }
            "3" => {
                dirty |= configure_scheduler(&mut root)?;
            }
            "4" => {
                dirty |= configure_data_dir(&mut root)?;
            }
            "5" => {
                println!("Config path: {}", path.display());
            }
            "6" => {
                if dirty {
                    save_config_value(&path, &root)?;
                    println!("Saved.");
                } else {
                    println!("No changes to save.");
                }
                break;
            }
            "7" | "q" | "Q" => {
                if dirty {
                    println!("Exited without saving.");
                }
                break;
            }
            _ => {
                println!("Invalid option.");
            }
        }
        println!();
    }

    Ok(())
}

/// Non-interactive override used by `femtoalarm style`.
pub fn set_delivery_style(style: DeliveryStyle) -> Result<()> {
    let path = crate::config::config_path();
    let mut root = load_config_value(&path)?;
    set_path(
        &mut root,
        &["deliveryStyle"],
        Value::String(style.to_string()),
    )?;
    save_config_value(&path, &root)?;
    println!("Delivery style set to {}. Send SIGHUP to a running scheduler to apply it.", style);
    Ok(())
}

fn configure_style(root: &mut Value) -> Result<bool> {
    let current = get_str_at(root, &["deliveryStyle"]).unwrap_or("system");
    let input = prompt_with_current("Delivery style (system/alternate)", current)?;
    let style: DeliveryStyle = match input.parse() {
        Ok(style) => style,
        Err(e) => {
            println!("{e}");
            return Ok(false);
        }
    };
    set_path(root, &["deliveryStyle"], Value::String(style.to_string()))?;
    Ok(true)
}

fn configure_system(root: &mut Value) -> Result<bool> {
    let defaults = SystemNotifyConfig::default();
    let current_cmd = get_str_at(root, &["system", "command"])
        .unwrap_or(&defaults.command)
        .to_string();
    let current_args = {
        let args = get_array_at(root, &["system", "args"]);
        if args.is_empty() {
            defaults.args.join(" ")
        } else {
            args.join(" ")
        }
    };
    let current_allowed = get_bool_at(root, &["system", "allowed"]).unwrap_or(defaults.allowed);
    let current_timeout =
        get_u64_at(root, &["system", "timeoutSecs"]).unwrap_or(defaults.timeout_secs);

    let command = prompt_with_current("Notification command", &current_cmd)?;
    if command.trim().is_empty() {
        println!("Command cannot be empty.");
        return Ok(false);
    }
    let args = prompt_with_current("Arguments before title/body (space separated)", &current_args)?;
    let allowed = prompt_with_current(
        "Allow system notifications (yes/no)",
        if current_allowed { "yes" } else { "no" },
    )?;
    let timeout = prompt_with_current("Timeout per attempt (seconds)", &current_timeout.to_string())?;

    let allowed = match parse_bool_input(&allowed) {
        Some(v) => v,
        None => {
            println!("Invalid yes/no value.");
            return Ok(false);
        }
    };
    let timeout: u64 = match timeout.trim().parse() {
        Ok(v) if v > 0 => v,
        _ => {
            println!("Timeout must be a positive number.");
            return Ok(false);
        }
    };

    set_path(root, &["system", "command"], Value::String(command.trim().to_string()))?;
    set_path(
        root,
        &["system", "args"],
        Value::Array(
            args.split_whitespace()
                .map(|s| Value::String(s.to_string()))
                .collect(),
        ),
    )?;
    set_path(root, &["system", "allowed"], Value::Bool(allowed))?;
    set_path(root, &["system", "timeoutSecs"], Value::from(timeout))?;
    Ok(true)
}

fn configure_scheduler(root: &mut Value) -> Result<bool> {
    let defaults = AppConfig::default();
    let current_tick = get_u64_at(root, &["tickMs"]).unwrap_or(defaults.tick_ms);
    let current_label = get_str_at(root, &["defaultLabel"])
        .unwrap_or(&defaults.default_label)
        .to_string();

    let tick = prompt_with_current("Tick interval (ms)", &current_tick.to_string())?;
    let label = prompt_with_current("Default alarm label", &current_label)?;

    let tick: u64 = match tick.trim().parse() {
        Ok(v) if (100..=60_000).contains(&v) => v,
        _ => {
            println!("Tick must be between 100 and 60000 ms.");
            return Ok(false);
        }
    };

    set_path(root, &["tickMs"], Value::from(tick))?;
    if !label.trim().is_empty() {
        set_path(root, &["defaultLabel"], Value::String(label.trim().to_string()))?;
    }
    Ok(true)
}

fn configure_data_dir(root: &mut Value) -> Result<bool> {
    let default_dir = AppConfig::default().data_dir.display().to_string();
    let current = get_str_at(root, &["dataDir"])
        .unwrap_or(&default_dir)
        .to_string();
    let dir = prompt_with_current("Data directory", &current)?;
    if dir.trim().is_empty() {
        return Ok(false);
    }
    set_path(root, &["dataDir"], Value::String(dir.trim().to_string()))?;
    Ok(true)
}

fn load_config_value(path: &Path) -> Result<Value> {
    if path.exists() {
        let content = fs::read_to_string(path)?;
        let parsed: Value = serde_json::from_str(&content)
            .map_err(|e| anyhow!("failed to parse config at {}: {e}", path.display()))?;
        if !parsed.is_object() {
            return Err(anyhow!(
                "invalid config at {}: root must be a JSON object",
                path.display()
            ));
        }
        Ok(parsed)
    } else {
        Ok(Value::Object(Map::new()))
    }
}

fn save_config_value(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)?;
    Ok(())
}

fn prompt_with_current(label: &str, current: &str) -> Result<String> {
    if current.trim().is_empty() {
        print!("{label}: ");
    } else {
        print!("{label} [{current}]: ");
    }
    io::stdout().flush().ok();
    let input = read_line()?.trim().to_string();
    if input.is_empty() && !current.trim().is_empty() {
        Ok(current.to_string())
    } else {
        Ok(input)
    }
}

fn read_line() -> Result<String> {
    let mut buf = String::new();
    io::stdin().read_line(&mut buf)?;
    Ok(buf)
}

fn set_path(value: &mut Value, path: &[&str], new_value: Value) -> Result<()> {
    if path.is_empty() {
        return Ok(());
    }
    let mut cur = value;
    for (idx, key) in path[..path.len() - 1].iter().enumerate() {
        let obj = cur
            .as_object_mut()
            .ok_or_else(|| anyhow!("invalid config: '{}' must be an object", path[..idx].join(".")))?;
        cur = obj
            .entry((*key).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    let obj = cur.as_object_mut().ok_or_else(|| {
        anyhow!(
            "invalid config: '{}' must be an object",
            path[..path.len() - 1].join(".")
        )
    })?;
    obj.insert(path[path.len() - 1].to_string(), new_value);
    Ok(())
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut cur = value;
    for key in path {
        cur = cur.get(*key)?;
    }
    Some(cur)
}

fn get_str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    lookup(value, path)?.as_str()
}

fn get_array_at(value: &Value, path: &[&str]) -> Vec<String> {
    lookup(value, path)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn get_bool_at(value: &Value, path: &[&str]) -> Option<bool> {
    lookup(value, path)?.as_bool()
}

fn get_u64_at(value: &Value, path: &[&str]) -> Option<u64> {
    lookup(value, path)?.as_u64()
}

fn parse_bool_input(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}
