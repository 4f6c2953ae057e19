use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use serde_yaml;
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "librovault")]
#[command(about = "Runs the librovault backend service", long_about = None)]
pub struct Cli {
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,
}

pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".librovault")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct App {
    port: i32,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl App {
    pub fn get_port(&self) -> i32 {
        return self.port;
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Supabase {
    pub url: String,
    pub service_key: String,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Razorpay {
    pub key_id: String,
    pub key_secret: String,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Gemini {
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct Smtp {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub sender: String,
    pub password: String,
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub app: App,
    pub supabase: Supabase,
    pub razorpay: Razorpay,
    pub gemini: Gemini,
    // Optional: approval emails are skipped when absent.
    #[serde(default)]
    pub smtp: Option<Smtp>,
}

impl Config {
    pub fn new(path: &str) -> Result<Self> {
        let cfg = Config::load_config(path)?;
        Ok(cfg)
    }

    fn load_config(path: &str) -> Result<Config> {
        let yaml_str = fs::read_to_string(path)?;
        let yaml_with_env = Config::substitute_env_vars(&yaml_str)?;
        let config: Config = serde_yaml::from_str(&yaml_with_env)?;
        Ok(config)
    }

    fn substitute_env_vars(yaml_str: &str) -> Result<String> {
        let mut result = yaml_str.to_string();
        let mut offset = 0;

        while let Some(start) = result[offset..].find("${") {
            let actual_start = offset + start;
            if let Some(end) = result[actual_start..].find("}") {
                let var_name = &result[actual_start + 2..actual_start + end];

                // Handle default values like ${VAR:-default}
                let env_value = if let Some(default_start) = var_name.find(":-") {
                    let actual_var = &var_name[..default_start];
                    let default_val = &var_name[default_start + 2..];
                    env::var(actual_var).unwrap_or_else(|_| default_val.to_string())
                } else {
                    env::var(var_name).unwrap_or_else(|_| {
                        println!("Warning: Environment variable '{}' not found", var_name);
                        String::new()
                    })
                };

                result.replace_range(actual_start..actual_start + end + 1, &env_value);
                offset = actual_start + env_value.len();
            } else {
                break;
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_substitution_with_default() {
        unsafe { env::remove_var("LIBROVAULT_TEST_MISSING") };
        let yaml = "key: ${LIBROVAULT_TEST_MISSING:-fallback}";
        let out = Config::substitute_env_vars(yaml).unwrap();
        assert_eq!(out, "key: fallback");
    }

    #[test]
    fn test_env_substitution_from_env() {
        unsafe { env::set_var("LIBROVAULT_TEST_SET", "hello") };
        let yaml = "key: ${LIBROVAULT_TEST_SET}";
        let out = Config::substitute_env_vars(yaml).unwrap();
        assert_eq!(out, "key: hello");
    }

    #[test]
    fn test_smtp_section_is_optional() {
        let yaml = r#"
app:
  port: 8080
supabase:
  url: http://localhost:54321
  service_key: key
razorpay:
  key_id: id
  key_secret: secret
gemini:
  api_key: key
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg.smtp.is_none());
        assert_eq!(cfg.gemini.model, "gemini-2.5-flash");
    }
}
