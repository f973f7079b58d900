//! PlatformIO project file (`platformio.ini`) reader.
//!
//! Only the subset of the INI dialect PlatformIO projects actually use is
//! understood:
//!
//! - `[section]` headers, with `[env]` as the common section and
//!   `[env:NAME]` as build environments
//! - `key = value` options (keys are case-insensitive)
//! - full-line `;` / `#` comments and inline ` ; comment` tails
//! - indented continuation lines, which turn a value into a multi-line list
//!
//! Options are looked up the way PlatformIO resolves them: the environment
//! section first, then the sections it `extends` (recursively), then the
//! common `[env]` section.

use crate::error::{Error, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of a PlatformIO project configuration.
pub const PROJECT_FILE: &str = "platformio.ini";

const ENV_PREFIX: &str = "env:";
const COMMON_ENV: &str = "env";
const BOARD_OVERRIDE_PREFIX: &str = "board_";
const EXTENDS: &str = "extends";

#[derive(Debug, Clone)]
struct Section {
    name: String,
    options: Vec<(String, String)>,
}

impl Section {
    fn get(&self, option: &str) -> Option<&str> {
        self.options
            .iter()
            .rev()
            .find(|(key, _)| key == option)
            .map(|(_, value)| value.as_str())
    }
}

/// Parsed `platformio.ini`.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    path: PathBuf,
    sections: Vec<Section>,
}

impl ProjectConfig {
    /// Load `platformio.ini` from a project directory.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(PROJECT_FILE);
        let text = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!("{} not found", path.display()))
            } else {
                Error::Io(e)
            }
        })?;
        let config = Self::parse(&text, &path)?;
        debug!(
            "Loaded project {} ({} sections)",
            path.display(),
            config.sections.len()
        );
        Ok(config)
    }

    /// Parse project configuration text. `path` is only used in error messages.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let mut sections: Vec<Section> = Vec::new();
        let mut current: Option<usize> = None;
        // (section index, option index) of the value a continuation line extends
        let mut last_option: Option<(usize, usize)> = None;

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let parse_error = |message: &str| Error::ProjectParse {
                path: path.to_path_buf(),
                line: line_no,
                message: message.to_string(),
            };

            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
                continue;
            }

            if raw.starts_with(char::is_whitespace) {
                let Some((s, o)) = last_option else {
                    return Err(parse_error("continuation line without an option"));
                };
                let value = &mut sections[s].options[o].1;
                let extra = strip_inline_comment(trimmed);
                if !extra.is_empty() {
                    value.push('\n');
                    value.push_str(extra);
                }
                continue;
            }

            if let Some(rest) = trimmed.strip_prefix('[') {
                let name = rest
                    .strip_suffix(']')
                    .ok_or_else(|| parse_error("unterminated section header"))?
                    .trim();
                if name.is_empty() {
                    return Err(parse_error("empty section name"));
                }
                // Re-opened sections append to their original entry
                current = Some(match sections.iter().position(|s| s.name == name) {
                    Some(existing) => existing,
                    None => {
                        sections.push(Section {
                            name: name.to_string(),
                            options: Vec::new(),
                        });
                        sections.len() - 1
                    },
                });
                last_option = None;
                continue;
            }

            let (key, value) = trimmed
                .split_once('=')
                .ok_or_else(|| parse_error("expected `key = value`"))?;
            let key = key.trim().to_lowercase();
            if key.is_empty() {
                return Err(parse_error("empty option name"));
            }
            let Some(s) = current else {
                return Err(parse_error("option outside of a section"));
            };
            let options = &mut sections[s].options;
            options.push((key, strip_inline_comment(value.trim()).to_string()));
            last_option = Some((s, options.len() - 1));
        }

        Ok(Self {
            path: path.to_path_buf(),
            sections,
        })
    }

    /// Path the configuration was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw option lookup in a single section.
    pub fn get(&self, section: &str, option: &str) -> Option<&str> {
        self.section(section)?.get(&option.to_lowercase())
    }

    fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Push `name` and then the sections it extends, depth first.
    ///
    /// Each section appears at most once, so `extends` cycles terminate.
    fn inheritance_chain<'s>(&'s self, name: &str, chain: &mut Vec<&'s str>) {
        let Some(section) = self.section(name) else {
            debug!("Extended section [{name}] does not exist");
            return;
        };
        if chain.contains(&section.name.as_str()) {
            return;
        }
        chain.push(section.name.as_str());
        if let Some(parents) = section.get(EXTENDS) {
            for parent in parse_list(parents) {
                self.inheritance_chain(parent, chain);
            }
        }
    }

    /// Names of all `[env:NAME]` sections, in file order.
    pub fn env_names(&self) -> Vec<&str> {
        self.sections
            .iter()
            .filter_map(|s| s.name.strip_prefix(ENV_PREFIX))
            .collect()
    }

    /// Environment used when none is requested explicitly.
    ///
    /// The first entry of `[platformio] default_envs` wins, otherwise the
    /// first `[env:NAME]` section of the file.
    pub fn default_env(&self) -> Result<&str> {
        if let Some(first) = self
            .get("platformio", "default_envs")
            .and_then(|v| parse_list(v).into_iter().next())
        {
            return Ok(first);
        }
        self.env_names()
            .into_iter()
            .next()
            .ok_or(Error::NoEnvironment)
    }

    /// Select a build environment by name, or the default one.
    pub fn env(&self, name: Option<&str>) -> Result<ProjectEnv<'_>> {
        let name = match name {
            Some(name) => name,
            None => self.default_env()?,
        };
        if self.section(&format!("{ENV_PREFIX}{name}")).is_none() {
            return Err(Error::UnknownEnvironment(name.to_string()));
        }
        Ok(ProjectEnv {
            config: self,
            name: name.to_string(),
        })
    }
}

/// A selected `[env:NAME]` with `[env]` fallback.
#[derive(Debug, Clone)]
pub struct ProjectEnv<'a> {
    config: &'a ProjectConfig,
    name: String,
}

impl ProjectEnv<'_> {
    /// Environment name (without the `env:` prefix).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up an option, falling back to the common `[env]` section.
    pub fn get(&self, option: &str) -> Option<&str> {
        let option = option.to_lowercase();
        self.lookup_order()
            .into_iter()
            .filter_map(|name| self.config.section(name))
            .find_map(|section| section.get(&option))
    }

    /// Sections consulted for options, most specific first: `[env:NAME]`,
    /// its `extends` chain, then `[env]`.
    fn lookup_order(&self) -> Vec<&str> {
        let mut chain = Vec::new();
        self.config
            .inheritance_chain(&format!("{ENV_PREFIX}{}", self.name), &mut chain);
        self.config.inheritance_chain(COMMON_ENV, &mut chain);
        chain
    }

    /// Look up an option that must be present and non-empty.
    pub fn require(&self, option: &str) -> Result<&str> {
        self.get(option)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::MissingOption {
                env: self.name.clone(),
                option: option.to_string(),
            })
    }

    /// The `custom_firmware` option: firmware file relative to the project.
    pub fn custom_firmware(&self) -> Result<&str> {
        self.require("custom_firmware")
    }

    /// The `board` option.
    pub fn board(&self) -> Result<&str> {
        self.require("board")
    }

    /// The `platform` option, if set.
    pub fn platform(&self) -> Option<&str> {
        self.get("platform").filter(|v| !v.is_empty())
    }

    /// The `upload_protocol` option, if set.
    pub fn upload_protocol(&self) -> Option<&str> {
        self.get("upload_protocol").filter(|v| !v.is_empty())
    }

    /// `board_<dotted.key> = value` options that override board metadata.
    ///
    /// The most general section comes first so more specific ones win when
    /// applied in order.
    pub fn board_overrides(&self) -> Vec<(String, String)> {
        let mut overrides = Vec::new();
        let order = self.lookup_order();
        for section in order.iter().rev().filter_map(|s| self.config.section(s)) {
            for (key, value) in &section.options {
                if let Some(dotted) = key.strip_prefix(BOARD_OVERRIDE_PREFIX) {
                    if dotted.contains('.') {
                        overrides.push((dotted.to_string(), value.clone()));
                    }
                }
            }
        }
        overrides
    }
}

/// Split a PlatformIO list value on commas and newlines.
pub fn parse_list(value: &str) -> Vec<&str> {
    value
        .split([',', '\n'])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect()
}

fn strip_inline_comment(value: &str) -> &str {
    let bytes = value.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b';' && (i == 0 || bytes[i - 1].is_ascii_whitespace()) {
            return value[..i].trim_end();
        }
    }
    value
}
