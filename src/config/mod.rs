//! Tool and toolbox descriptor schemas.
//!
//! A tool directory carries a `tool.yml` describing its parameters and the
//! function that implements it; a toolbox directory carries a `toolbox.yml`
//! with an alias and optional tool list. Loading goes YAML -> JSON Schema ->
//! typed struct -> semantic checks, and every failure comes back as a
//! `ConfigError` naming the file.

pub mod tool;
pub mod toolbox;

pub use tool::{
    CheckKind, CodeSample, Direction, FilterConfig, FilterKind, ImplementationConfig,
    ParameterConfig, ParameterSyntax, ParameterType, TOOL_DESCRIPTOR, ToolConfig,
    ToolDocumentation, ToolMetadata, ValidationCheck, load_tool_config, parse_tool_config,
};
pub use toolbox::{
    TOOLBOX_DESCRIPTOR, ToolboxConfig, ToolboxDocumentation, ToolboxMetadata, ToolboxToolEntry,
    load_toolbox_config, validate_alias,
};
