//! Named build targets exposed to the operator.

#[cfg(feature = "serde")]
use serde::Serialize;

/// A named action that can be listed and invoked by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Target {
    /// Invocation name.
    pub name: &'static str,
    /// Short title shown in target lists.
    pub title: &'static str,
    /// One-line description.
    pub description: &'static str,
}

/// Name of the custom firmware upload target.
pub const UPLOAD_CUSTOM_FIRMWARE: &str = "upload-custom-firmware";

/// All registered targets.
pub const TARGETS: &[Target] = &[Target {
    name: UPLOAD_CUSTOM_FIRMWARE,
    title: "Upload custom firmware",
    description: "Upload a custom firmware",
}];

/// Look up a target by name.
pub fn find(name: &str) -> Option<&'static Target> {
    TARGETS.iter().find(|target| target.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_target_registered() {
        let target = find(UPLOAD_CUSTOM_FIRMWARE).unwrap();
        assert_eq!(target.title, "Upload custom firmware");
        assert_eq!(target.description, "Upload a custom firmware");
    }

    #[test]
    fn test_unknown_target() {
        assert!(find("upload").is_none());
    }

    #[test]
    fn test_target_names_unique() {
        for (i, a) in TARGETS.iter().enumerate() {
            assert!(TARGETS[i + 1..].iter().all(|b| b.name != a.name));
        }
    }
}
