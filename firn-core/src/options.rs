//! A registry of typed, validated configuration options.
//!
//! The external CLI component (out of scope, per §1) surfaces these to
//! users; the core only specifies their shape (§6, §12).

use crate::error::BuildError;

/// A validated option value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OptionValue
{
    Bool(bool),
    Str(String),
}

/// One entry in an [`OptionRegistry`].
pub struct OptionSpec
{
    /// The option's name, as it would appear on a command line.
    pub name: &'static str,
    /// One-line help text.
    pub help: &'static str,
    /// The value used when the option is not explicitly set.
    pub default: OptionValue,
    /// For a choice or choice-map option, the set of values printed by
    /// [`OptionRegistry::render_help`]. `None` for free-form string/bool
    /// options.
    pub allowed: Option<&'static [&'static str]>,
    /// Parses a raw string into a validated [`OptionValue`], or returns a
    /// human-readable reason the value is invalid. Boxed rather than a bare
    /// `fn` pointer so that a choice-map validator (see [`validate_choice`])
    /// can close over its own allowed-value list.
    pub validate: Box<dyn Fn(&str) -> Result<OptionValue, String>>,
}

/// The complete configuration surface the engine exposes (§6, §12).
pub struct OptionRegistry
{
    entries: Vec<OptionSpec>,
}

impl OptionRegistry
{
    /// A registry with no entries.
    pub fn new() -> Self
    {
        Self { entries: Vec::new() }
    }

    /// Register `spec`, overwriting any prior entry with the same name.
    pub fn register(&mut self, spec: OptionSpec)
    {
        self.entries.retain(|existing| existing.name != spec.name);
        self.entries.push(spec);
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &str) -> Option<&OptionSpec>
    {
        self.entries.iter().find(|spec| spec.name == name)
    }

    /// Validate a raw string value for `name`.
    ///
    /// Returns [`BuildError::UnknownOption`] if no such option is
    /// registered, or [`BuildError::InvalidOptionValue`] if the value fails
    /// validation.
    pub fn validate(&self, name: &str, value: &str) -> Result<OptionValue, BuildError>
    {
        let spec = self.get(name)
            .ok_or_else(|| BuildError::UnknownOption(name.to_owned()))?;
        (spec.validate)(value).map_err(|reason| BuildError::InvalidOptionValue {
            name: name.to_owned(),
            value: value.to_owned(),
            reason,
        })
    }

    /// Render the allowed values and default for every registered option,
    /// one line per option, for `--help`-style output.
    pub fn render_help(&self) -> String
    {
        let mut out = String::new();
        for spec in &self.entries {
            out.push_str(spec.name);
            out.push_str(": ");
            out.push_str(spec.help);
            if let Some(allowed) = spec.allowed {
                out.push_str(" [");
                out.push_str(&allowed.join(", "));
                out.push(']');
            }
            out.push_str(" (default: ");
            match &spec.default {
                OptionValue::Bool(b) => out.push_str(&b.to_string()),
                OptionValue::Str(s) => out.push_str(s),
            }
            out.push_str(")\n");
        }
        out
    }

    /// All registered option names.
    pub fn names(&self) -> impl Iterator<Item = &str>
    {
        self.entries.iter().map(|spec| spec.name)
    }
}

impl Default for OptionRegistry
{
    fn default() -> Self
    {
        Self::new()
    }
}

/// Validator for a fixed set of string choices.
pub fn validate_choice(allowed: &'static [&'static str]) -> Box<dyn Fn(&str) -> Result<OptionValue, String>>
{
    Box::new(move |value| {
        if allowed.contains(&value) {
            Ok(OptionValue::Str(value.to_owned()))
        } else {
            Err(format!("expected one of [{}]", allowed.join(", ")))
        }
    })
}
