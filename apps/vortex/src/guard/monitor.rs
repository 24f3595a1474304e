use crate::config::MonitorConfig;

/// A script-like node inserted into the hosting document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptNode {
    pub src: Option<String>,
    pub inline: Option<String>,
}

impl ScriptNode {
    pub fn external(src: impl Into<String>) -> Self {
        Self {
            src: Some(src.into()),
            inline: None,
        }
    }

    pub fn inline(text: impl Into<String>) -> Self {
        Self {
            src: None,
            inline: Some(text.into()),
        }
    }

    /// How a removed node is reported.
    pub fn label(&self) -> String {
        match self.src.as_deref() {
            Some(src) if !src.is_empty() => src.to_string(),
            _ => "inline script".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptVerdict {
    Keep,
    Remove { source: String },
}

/// Substring denylist of monitoring-tool signatures. Matching is
/// case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorDenylist {
    src_signatures: Vec<String>,
    inline_signatures: Vec<String>,
}

impl MonitorDenylist {
    pub fn new(src_signatures: Vec<String>, inline_signatures: Vec<String>) -> Self {
        Self {
            src_signatures,
            inline_signatures,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(
            config.src_signatures.clone(),
            config.inline_signatures.clone(),
        )
    }

    pub fn inspect(&self, node: &ScriptNode) -> ScriptVerdict {
        let src = node.src.as_deref().unwrap_or_default();
        let inline = node.inline.as_deref().unwrap_or_default();
        let src_hit = self
            .src_signatures
            .iter()
            .any(|signature| !signature.is_empty() && src.contains(signature.as_str()));
        let inline_hit = self
            .inline_signatures
            .iter()
            .any(|signature| !signature.is_empty() && inline.contains(signature.as_str()));
        if src_hit || inline_hit {
            ScriptVerdict::Remove {
                source: node.label(),
            }
        } else {
            ScriptVerdict::Keep
        }
    }
}

impl Default for MonitorDenylist {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_external_sources() {
        let denylist = MonitorDenylist::default();
        assert_eq!(
            denylist.inspect(&ScriptNode::external("https://cdn.securly.test/agent.js")),
            ScriptVerdict::Remove {
                source: "https://cdn.securly.test/agent.js".into()
            }
        );
        assert_eq!(
            denylist.inspect(&ScriptNode::external("https://cdn.example.test/app.js")),
            ScriptVerdict::Keep
        );
    }

    #[test]
    fn matches_inline_text_with_its_own_list() {
        let denylist = MonitorDenylist::default();
        assert_eq!(
            denylist.inspect(&ScriptNode::inline("window.monitoring = true")),
            ScriptVerdict::Remove {
                source: "inline script".into()
            }
        );
        // iboss is only a source signature.
        assert_eq!(
            denylist.inspect(&ScriptNode::inline("load('iboss')")),
            ScriptVerdict::Keep
        );
    }

    #[test]
    fn matching_is_case_sensitive() {
        let denylist = MonitorDenylist::default();
        assert_eq!(
            denylist.inspect(&ScriptNode::external("https://GoGuardian.test/x.js")),
            ScriptVerdict::Keep
        );
    }

    #[test]
    fn empty_signatures_never_match() {
        let denylist = MonitorDenylist::new(vec![String::new()], vec![String::new()]);
        assert_eq!(
            denylist.inspect(&ScriptNode::external("https://a.test/x.js")),
            ScriptVerdict::Keep
        );
    }
}
