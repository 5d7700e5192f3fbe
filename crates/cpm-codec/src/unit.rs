//! systemd unit text
//!
//! Deserializing yields options in document order. Serializing groups
//! options by section, with sections in order of first appearance and a
//! blank line between sections.

use crate::error::CodecError;
use std::fmt;

/// One `Name=Value` line of a unit, with its section
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitOption {
    /// Section name without brackets
    pub section: String,
    /// Option name
    pub name: String,
    /// Option value
    pub value: String,
}

impl UnitOption {
    /// Create option
    pub fn new(
        section: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            section: section.into(),
            name: name.into(),
            value: value.into(),
        }
    }

    /// Whether this option has the given section and name
    #[inline]
    #[must_use]
    pub fn is(&self, section: &str, name: &str) -> bool {
        self.section == section && self.name == name
    }

    fn validate(&self) -> Result<(), CodecError> {
        if self.section.is_empty() || self.section.contains([']', '\n']) {
            return Err(CodecError::InvalidUnitOption(format!(
                "bad section name '{}'",
                self.section
            )));
        }
        if self.name.is_empty() || self.name.contains(['=', '\n']) {
            return Err(CodecError::InvalidUnitOption(format!(
                "bad option name '{}'",
                self.name
            )));
        }
        if self.value.contains('\n') {
            return Err(CodecError::InvalidUnitOption(format!(
                "value of {} contains a newline",
                self.name
            )));
        }
        Ok(())
    }
}

impl fmt::Display for UnitOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}={}", self.section, self.name, self.value)
    }
}

/// Unit text <-> option list
pub trait UnitSerializer: Send + Sync {
    /// Render options as unit text
    ///
    /// # Errors
    /// Returns error if an option cannot be represented
    fn serialize(&self, options: &[UnitOption]) -> Result<String, CodecError>;

    /// Parse unit text into options
    ///
    /// # Errors
    /// Returns error on malformed unit text
    fn deserialize(&self, content: &str) -> Result<Vec<UnitOption>, CodecError>;
}

/// Serializer for the systemd unit file format
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemdUnitSerializer;

impl SystemdUnitSerializer {
    /// Create serializer
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl UnitSerializer for SystemdUnitSerializer {
    fn serialize(&self, options: &[UnitOption]) -> Result<String, CodecError> {
        let mut sections: Vec<(&str, Vec<&UnitOption>)> = Vec::new();
        for option in options {
            option.validate()?;
            match sections.iter_mut().find(|(s, _)| *s == option.section) {
                Some((_, members)) => members.push(option),
                None => sections.push((&option.section, vec![option])),
            }
        }

        let mut out = String::new();
        for (i, (section, members)) in sections.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push('[');
            out.push_str(section);
            out.push_str("]\n");
            for option in members {
                out.push_str(&option.name);
                out.push('=');
                out.push_str(&option.value);
                out.push('\n');
            }
        }
        Ok(out)
    }

    fn deserialize(&self, content: &str) -> Result<Vec<UnitOption>, CodecError> {
        let mut options = Vec::new();
        let mut section: Option<String> = None;
        let mut lines = content.lines().enumerate();

        while let Some((idx, raw)) = lines.next() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if line.starts_with('[') {
                let name = line
                    .strip_prefix('[')
                    .and_then(|l| l.strip_suffix(']'))
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| CodecError::unit_syntax(line_no, "malformed section header"))?;
                section = Some(name.to_string());
                continue;
            }

            let Some(current) = section.as_deref() else {
                return Err(CodecError::unit_syntax(line_no, "option outside of any section"));
            };
            let Some((name, value)) = line.split_once('=') else {
                return Err(CodecError::unit_syntax(line_no, "expected Name=Value"));
            };
            let name = name.trim();
            if name.is_empty() {
                return Err(CodecError::unit_syntax(line_no, "empty option name"));
            }

            let mut value = value.trim().to_string();
            while let Some(stripped) = value.strip_suffix('\\') {
                let head = stripped.trim_end().to_string();
                match lines.next() {
                    Some((_, next)) => {
                        value = head;
                        let next = next.trim();
                        if !next.is_empty() {
                            if !value.is_empty() {
                                value.push(' ');
                            }
                            value.push_str(next);
                        }
                    }
                    None => {
                        value = head;
                        break;
                    }
                }
            }

            options.push(UnitOption::new(current, name, value));
        }

        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const KUBELET_UNIT: &str = "\
[Unit]
Description=kubelet daemon
After=docker.service

[Service]
Restart=always
ExecStart=/opt/bin/kubelet \\
    --config=/var/lib/kubelet/config/kubelet \\
    --v=2

[Install]
WantedBy=multi-user.target
";

    #[test]
    fn deserialize_unit() {
        let options = SystemdUnitSerializer.deserialize(KUBELET_UNIT).unwrap();

        assert_eq!(options.len(), 5);
        assert_eq!(options[0], UnitOption::new("Unit", "Description", "kubelet daemon"));
        assert_eq!(
            options[3],
            UnitOption::new(
                "Service",
                "ExecStart",
                "/opt/bin/kubelet --config=/var/lib/kubelet/config/kubelet --v=2"
            )
        );
        assert!(options[4].is("Install", "WantedBy"));
    }

    #[test]
    fn deserialize_skips_comments() {
        let content = "# header\n[Service]\n; note\nType=oneshot\n";
        let options = SystemdUnitSerializer.deserialize(content).unwrap();
        assert_eq!(options, vec![UnitOption::new("Service", "Type", "oneshot")]);
    }

    #[test]
    fn deserialize_keeps_equals_in_value() {
        let content = "[Service]\nEnvironment=KUBELET_OPTS=--v=2\n";
        let options = SystemdUnitSerializer.deserialize(content).unwrap();
        assert_eq!(options[0].name, "Environment");
        assert_eq!(options[0].value, "KUBELET_OPTS=--v=2");
    }

    #[test]
    fn deserialize_errors() {
        let s = SystemdUnitSerializer;
        assert!(matches!(
            s.deserialize("Type=oneshot\n"),
            Err(CodecError::UnitSyntax { line: 1, .. })
        ));
        assert!(matches!(
            s.deserialize("[Service\nType=oneshot\n"),
            Err(CodecError::UnitSyntax { line: 1, .. })
        ));
        assert!(matches!(
            s.deserialize("[Service]\nnot an option\n"),
            Err(CodecError::UnitSyntax { line: 2, .. })
        ));
    }

    #[test]
    fn serialize_groups_sections() {
        let options = vec![
            UnitOption::new("Unit", "Description", "kubelet"),
            UnitOption::new("Service", "Restart", "always"),
            UnitOption::new("Unit", "After", "network.target"),
        ];
        let text = SystemdUnitSerializer.serialize(&options).unwrap();
        assert_eq!(
            text,
            "[Unit]\nDescription=kubelet\nAfter=network.target\n\n[Service]\nRestart=always\n"
        );
    }

    #[test]
    fn serialize_empty() {
        assert_eq!(SystemdUnitSerializer.serialize(&[]).unwrap(), "");
    }

    #[test]
    fn serialize_rejects_bad_options() {
        let s = SystemdUnitSerializer;
        assert!(s.serialize(&[UnitOption::new("", "A", "b")]).is_err());
        assert!(s.serialize(&[UnitOption::new("Service", "A=B", "c")]).is_err());
        assert!(s.serialize(&[UnitOption::new("Service", "A", "b\nc")]).is_err());
    }

    #[test]
    fn reserialize_is_stable() {
        let s = SystemdUnitSerializer;
        let once = s.serialize(&s.deserialize(KUBELET_UNIT).unwrap()).unwrap();
        let twice = s.serialize(&s.deserialize(&once).unwrap()).unwrap();
        assert_eq!(once, twice);
    }
}
