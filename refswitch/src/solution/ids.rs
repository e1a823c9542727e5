use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};

use serde::{Serialize, Serializer};

/// A braced GUID as written in a manifest. Keeps the original spelling for
/// output and compares case-insensitively.
#[derive(Debug, Clone)]
pub struct Guid {
    raw: String,
    key: String,
}

impl Guid {
    /// Parse `{xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx}` (braces optional on input).
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let inner = trimmed
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .unwrap_or(trimmed);
        if !is_guid_body(inner) {
            return None;
        }
        let raw = if trimmed.starts_with('{') {
            trimmed.to_string()
        } else {
            format!("{{{inner}}}")
        };
        Some(Self {
            key: inner.to_ascii_uppercase(),
            raw,
        })
    }

    /// A fresh random GUID in the upper-case braced form Visual Studio writes.
    pub fn new_random() -> Self {
        let inner = uuid::Uuid::new_v4().hyphenated().to_string().to_ascii_uppercase();
        Self {
            raw: format!("{{{inner}}}"),
            key: inner,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl PartialEq for Guid {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Guid {}

impl Hash for Guid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for Guid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Guid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

impl Display for Guid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for Guid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

fn is_guid_body(s: &str) -> bool {
    let groups = s.split('-').map(str::len).collect::<Vec<_>>();
    groups == [8, 4, 4, 4, 12] && s.chars().all(|c| c == '-' || c.is_ascii_hexdigit())
}

/// Identity of a project entry within a solution.
pub type ProjectId = Guid;

/// Project kind classifier from the `Project("{type}")` line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProjectTypeId(pub Guid);

impl ProjectTypeId {
    pub const CSHARP: &'static str = "{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}";
    pub const CSHARP_SDK: &'static str = "{9A19103F-16F7-4668-BE54-9A1E7A4F7556}";
    pub const VB: &'static str = "{F184B08F-C81C-45F6-A57F-5ABD9991F28F}";
    pub const VB_SDK: &'static str = "{778DAE3C-4631-46EA-AA77-85C1314464D9}";
    pub const FSHARP: &'static str = "{F2A71F9B-5D33-465A-A702-920D77279786}";
    pub const FSHARP_SDK: &'static str = "{6EC3EE1D-3C4E-46DD-8F32-0CC8E7565705}";
    pub const CPP: &'static str = "{8BC9CEB8-8B4A-11D0-8D11-00A0C91BC942}";
    pub const SOLUTION_FOLDER: &'static str = "{2150E333-8FDC-42A3-9474-1A3956D46DE8}";
    pub const WEB_SITE: &'static str = "{E24C65DC-7377-472B-9ABA-BC803B73C61A}";

    const COMPILABLE: [&'static str; 6] = [
        Self::CSHARP,
        Self::CSHARP_SDK,
        Self::VB,
        Self::VB_SDK,
        Self::FSHARP,
        Self::FSHARP_SDK,
    ];

    pub fn parse(input: &str) -> Option<Self> {
        Guid::parse(input).map(Self)
    }

    fn known(constant: &str) -> Self {
        Self(Guid::parse(constant).unwrap_or_else(Guid::new_random))
    }

    /// Type id for a project file, chosen by extension and SDK style.
    pub fn for_project_file(extension: &str, sdk_style: bool) -> Self {
        let constant = match (extension.to_ascii_lowercase().as_str(), sdk_style) {
            ("vbproj", false) => Self::VB,
            ("vbproj", true) => Self::VB_SDK,
            ("fsproj", false) => Self::FSHARP,
            ("fsproj", true) => Self::FSHARP_SDK,
            (_, true) => Self::CSHARP_SDK,
            _ => Self::CSHARP,
        };
        Self::known(constant)
    }

    /// Managed project kinds whose references this tool rewrites.
    pub fn is_compilable(&self) -> bool {
        Self::COMPILABLE.iter().any(|c| self.is(c))
    }

    fn is(&self, constant: &str) -> bool {
        Guid::parse(constant).is_some_and(|g| g == self.0)
    }

    /// Human readable kind name.
    pub fn name(&self) -> &'static str {
        let table: [(&str, &str); 9] = [
            (Self::CSHARP, "C#"),
            (Self::CSHARP_SDK, "C# (SDK)"),
            (Self::VB, "Visual Basic"),
            (Self::VB_SDK, "Visual Basic (SDK)"),
            (Self::FSHARP, "F#"),
            (Self::FSHARP_SDK, "F# (SDK)"),
            (Self::CPP, "C++"),
            (Self::SOLUTION_FOLDER, "Solution Folder"),
            (Self::WEB_SITE, "Web Site"),
        ];
        table
            .iter()
            .find(|(constant, _)| self.is(constant))
            .map(|(_, name)| *name)
            .unwrap_or("Unknown")
    }
}

impl Display for ProjectTypeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
