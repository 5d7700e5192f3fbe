//! Helpers for ensurer implementations
//!
//! Small insert-or-replace operations on the lists ensurers typically edit:
//! containers, environment variables, command-line flags and unit options.

use cpm_codec::UnitOption;
use cpm_model::{Container, EnvVar};

/// Container with the given name
#[must_use]
pub fn container_with_name<'a>(containers: &'a [Container], name: &str) -> Option<&'a Container> {
    containers.iter().find(|c| c.name == name)
}

/// Mutable container with the given name
pub fn container_with_name_mut<'a>(
    containers: &'a mut [Container],
    name: &str,
) -> Option<&'a mut Container> {
    containers.iter_mut().find(|c| c.name == name)
}

/// Replace the container with the same name, or append it
pub fn ensure_container_with_name(containers: &mut Vec<Container>, container: Container) {
    match container_with_name_mut(containers, &container.name) {
        Some(existing) => *existing = container,
        None => containers.push(container),
    }
}

/// Replace the variable with the same name, or append it
pub fn ensure_env_var(env: &mut Vec<EnvVar>, var: EnvVar) {
    match env.iter_mut().find(|e| e.name == var.name) {
        Some(existing) => *existing = var,
        None => env.push(var),
    }
}

/// Set `prefix` + `value` in place of the first item starting with `prefix`
///
/// Appends when no item starts with `prefix`.
pub fn ensure_string_with_prefix(items: &mut Vec<String>, prefix: &str, value: &str) {
    let item = format!("{prefix}{value}");
    match items.iter_mut().find(|i| i.starts_with(prefix)) {
        Some(existing) => *existing = item,
        None => items.push(item),
    }
}

/// Remove every item starting with `prefix`
pub fn ensure_no_string_with_prefix(items: &mut Vec<String>, prefix: &str) {
    items.retain(|i| !i.starts_with(prefix));
}

/// Replace the option with the same section and name, or append it
pub fn ensure_unit_option(options: &mut Vec<UnitOption>, option: UnitOption) {
    match options
        .iter_mut()
        .find(|o| o.is(&option.section, &option.name))
    {
        Some(existing) => *existing = option,
        None => options.push(option),
    }
}

/// Remove every option with the given section and name
///
/// Returns whether an option was removed.
pub fn delete_unit_option(options: &mut Vec<UnitOption>, section: &str, name: &str) -> bool {
    let before = options.len();
    options.retain(|o| !o.is(section, name));
    options.len() != before
}
