pub const BUILTIN_TOOLS_JSON: &str = include_str!("../templates/tools.json");
