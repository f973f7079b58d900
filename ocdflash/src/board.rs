//! Board metadata (PlatformIO board manifest JSON).
//!
//! The parts used here:
//!
//! ```json
//! {
//!   "debug": {
//!     "tools": {
//!       "stlink": { "server": { "package": "tool-openocd", "arguments": ["-f", "..."] } }
//!     }
//!   },
//!   "upload": { "offset_address": "0x08000000", "protocol": "stlink" }
//! }
//! ```

use crate::error::{Error, Result};
use log::debug;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Flash base address used when the board does not declare one.
pub const DEFAULT_OFFSET_ADDRESS: &str = "0x08000000";

/// Parsed board manifest.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    manifest: Value,
}

impl BoardConfig {
    /// Load a board manifest from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let manifest = serde_json::from_str(&text).map_err(|source| Error::BoardParse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded board manifest {}", path.display());
        Ok(Self { manifest })
    }

    /// Parse a board manifest from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let manifest = serde_json::from_str(text).map_err(|source| Error::BoardParse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        Ok(Self { manifest })
    }

    /// Find the manifest for `board`.
    ///
    /// Project-local `boards/` takes precedence over the platform's boards.
    pub fn locate(
        project_dir: &Path,
        core_dir: &Path,
        platform: Option<&str>,
        board: &str,
    ) -> Result<PathBuf> {
        let file_name = format!("{board}.json");
        let mut searched = vec![project_dir.join("boards").join(&file_name)];
        if let Some(platform) = platform {
            searched.push(
                core_dir
                    .join("platforms")
                    .join(platform)
                    .join("boards")
                    .join(&file_name),
            );
        }
        match searched.iter().find(|path| path.is_file()) {
            Some(found) => Ok(found.clone()),
            None => Err(Error::BoardNotFound {
                board: board.to_string(),
                searched,
            }),
        }
    }

    /// Look up a value by dotted path, e.g. `upload.offset_address`.
    pub fn get(&self, dotted: &str) -> Option<&Value> {
        dotted
            .split('.')
            .try_fold(&self.manifest, |value, key| value.get(key))
    }

    fn get_str(&self, dotted: &str) -> Option<&str> {
        self.get(dotted).and_then(Value::as_str)
    }

    /// Set a value by dotted path, creating intermediate objects.
    ///
    /// Used for `board_<dotted.key>` project overrides.
    pub fn apply_override(&mut self, dotted: &str, value: &str) {
        let mut node = &mut self.manifest;
        for key in dotted.split('.') {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            let Value::Object(map) = node else {
                return;
            };
            node = map.entry(key.to_string()).or_insert(Value::Null);
        }
        *node = Value::String(value.to_string());
    }

    /// The `debug.tools` mapping, if the board declares one.
    pub fn debug_tools(&self) -> Option<&Map<String, Value>> {
        self.get("debug.tools").and_then(Value::as_object)
    }

    /// Protocols with a `debug.tools` entry, sorted by name.
    pub fn protocols(&self) -> Vec<String> {
        self.debug_tools()
            .map(|tools| tools.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Debug server arguments for an upload protocol.
    ///
    /// An unknown protocol or an entry without `server` is an error; a
    /// `server` without `arguments` yields an empty list.
    pub fn server_arguments(&self, protocol: &str) -> Result<Vec<String>> {
        let tool = self
            .debug_tools()
            .and_then(|tools| tools.get(protocol))
            .ok_or_else(|| Error::UnknownProtocol {
                protocol: protocol.to_string(),
                available: self.protocols(),
            })?;
        let server = tool
            .get("server")
            .filter(|server| server.is_object())
            .ok_or_else(|| Error::MissingServer {
                protocol: protocol.to_string(),
            })?;

        let Some(arguments) = server.get("arguments") else {
            return Ok(Vec::new());
        };
        let invalid = || Error::InvalidServerArguments {
            protocol: protocol.to_string(),
        };
        arguments
            .as_array()
            .ok_or_else(invalid)?
            .iter()
            .map(|arg| arg.as_str().map(str::to_string).ok_or_else(invalid))
            .collect()
    }

    /// Flash address the firmware is written to.
    pub fn offset_address(&self) -> &str {
        self.get_str("upload.offset_address")
            .unwrap_or(DEFAULT_OFFSET_ADDRESS)
    }

    /// Upload protocol the board uses when the project does not choose one.
    pub fn default_upload_protocol(&self) -> Option<&str> {
        self.get_str("upload.protocol")
    }

    /// Human-readable board name, if the manifest has one.
    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NUCLEO: &str = r#"{
        "name": "ST Nucleo G474RE",
        "debug": {
            "tools": {
                "stlink": {
                    "server": {
                        "package": "tool-openocd",
                        "executable": "bin/openocd",
                        "arguments": ["-s", "$PACKAGE_DIR/openocd/scripts", "-f", "interface/stlink.cfg", "-f", "target/stm32g4x.cfg"]
                    }
                },
                "cmsis-dap": {
                    "server": { "package": "tool-openocd" }
                },
                "blackmagic": {
                    "hwbreakpoints": true
                }
            }
        },
        "upload": {
            "protocol": "stlink",
            "protocols": ["stlink", "cmsis-dap", "blackmagic"]
        }
    }"#;

    fn board() -> BoardConfig {
        BoardConfig::from_json(NUCLEO).unwrap()
    }

    // ---- Lookup ----

    #[test]
    fn test_dotted_get() {
        let board = board();
        assert_eq!(board.get("upload.protocol"), Some(&Value::from("stlink")));
        assert!(board.get("upload.missing").is_none());
        assert!(board.get("name.deeper").is_none());
    }

    #[test]
    fn test_protocols_sorted() {
        assert_eq!(board().protocols(), vec!["blackmagic", "cmsis-dap", "stlink"]);
    }

    // ---- Server arguments ----

    #[test]
    fn test_server_arguments_in_order() {
        let args = board().server_arguments("stlink").unwrap();
        assert_eq!(
            args,
            vec![
                "-s",
                "$PACKAGE_DIR/openocd/scripts",
                "-f",
                "interface/stlink.cfg",
                "-f",
                "target/stm32g4x.cfg"
            ]
        );
    }

    #[test]
    fn test_server_without_arguments_is_empty() {
        assert!(board().server_arguments("cmsis-dap").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_protocol() {
        match board().server_arguments("jlink") {
            Err(Error::UnknownProtocol { protocol, available }) => {
                assert_eq!(protocol, "jlink");
                assert_eq!(available.len(), 3);
            },
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_tool_without_server() {
        assert!(matches!(
            board().server_arguments("blackmagic"),
            Err(Error::MissingServer { protocol }) if protocol == "blackmagic"
        ));
    }

    #[test]
    fn test_no_debug_tools_at_all() {
        let board = BoardConfig::from_json(r#"{"upload": {}}"#).unwrap();
        assert!(matches!(
            board.server_arguments("stlink"),
            Err(Error::UnknownProtocol { available, .. }) if available.is_empty()
        ));
    }

    #[test]
    fn test_non_string_arguments_rejected() {
        let board = BoardConfig::from_json(
            r#"{"debug": {"tools": {"stlink": {"server": {"arguments": ["-f", 3]}}}}}"#,
        )
        .unwrap();
        assert!(matches!(
            board.server_arguments("stlink"),
            Err(Error::InvalidServerArguments { .. })
        ));
    }

    // ---- Offset address ----

    #[test]
    fn test_default_offset_address() {
        assert_eq!(board().offset_address(), "0x08000000");
    }

    #[test]
    fn test_declared_offset_address_verbatim() {
        let board =
            BoardConfig::from_json(r#"{"upload": {"offset_address": "0x8004000"}}"#).unwrap();
        assert_eq!(board.offset_address(), "0x8004000");
    }

    #[test]
    fn test_apply_override() {
        let mut board = board();
        board.apply_override("upload.offset_address", "0x08010000");
        assert_eq!(board.offset_address(), "0x08010000");
        // Existing siblings untouched
        assert_eq!(board.default_upload_protocol(), Some("stlink"));
    }

    #[test]
    fn test_apply_override_creates_path() {
        let mut board = BoardConfig::from_json("{}").unwrap();
        board.apply_override("debug.tools.stlink.server.package", "tool-openocd");
        assert_eq!(
            board.get("debug.tools.stlink.server.package"),
            Some(&Value::from("tool-openocd"))
        );
    }

    #[test]
    fn test_name() {
        assert_eq!(board().name(), Some("ST Nucleo G474RE"));
    }

    // ---- Files ----

    #[test]
    fn test_locate_prefers_project_boards() {
        let project = tempfile::tempdir().unwrap();
        let core = tempfile::tempdir().unwrap();
        let local = project.path().join("boards");
        let global = core.path().join("platforms/ststm32/boards");
        fs::create_dir_all(&local).unwrap();
        fs::create_dir_all(&global).unwrap();
        fs::write(global.join("custom.json"), "{}").unwrap();

        let found =
            BoardConfig::locate(project.path(), core.path(), Some("ststm32"), "custom").unwrap();
        assert_eq!(found, global.join("custom.json"));

        fs::write(local.join("custom.json"), "{}").unwrap();
        let found =
            BoardConfig::locate(project.path(), core.path(), Some("ststm32"), "custom").unwrap();
        assert_eq!(found, local.join("custom.json"));
    }

    #[test]
    fn test_locate_not_found() {
        let project = tempfile::tempdir().unwrap();
        let core = tempfile::tempdir().unwrap();
        match BoardConfig::locate(project.path(), core.path(), Some("ststm32"), "nope") {
            Err(Error::BoardNotFound { board, searched }) => {
                assert_eq!(board, "nope");
                assert_eq!(searched.len(), 2);
            },
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            BoardConfig::load(&path),
            Err(Error::BoardParse { .. })
        ));
    }
}
