//! Finding and replacing entries in a bundle's file and unit lists
//!
//! Entries are identified by path (files) or name (units). The `ensure_*`
//! functions insert or replace in place, so an identifier never appears twice.

use crate::osc::{File, Unit};

/// File entry with the given path
#[must_use]
pub fn file_with_path<'a>(files: &'a [File], path: &str) -> Option<&'a File> {
    files.iter().find(|f| f.path == path)
}

/// Mutable file entry with the given path
pub fn file_with_path_mut<'a>(files: &'a mut [File], path: &str) -> Option<&'a mut File> {
    files.iter_mut().find(|f| f.path == path)
}

/// Unit entry with the given name
#[must_use]
pub fn unit_with_name<'a>(units: &'a [Unit], name: &str) -> Option<&'a Unit> {
    units.iter().find(|u| u.name == name)
}

/// Mutable unit entry with the given name
pub fn unit_with_name_mut<'a>(units: &'a mut [Unit], name: &str) -> Option<&'a mut Unit> {
    units.iter_mut().find(|u| u.name == name)
}

/// Replace the file with the same path, or append it
pub fn ensure_file_with_path(files: &mut Vec<File>, file: File) {
    match file_with_path_mut(files, &file.path) {
        Some(existing) => *existing = file,
        None => files.push(file),
    }
}

/// Replace the unit with the same name, or append it
pub fn ensure_unit_with_name(units: &mut Vec<Unit>, unit: Unit) {
    match unit_with_name_mut(units, &unit.name) {
        Some(existing) => *existing = unit,
        None => units.push(unit),
    }
}

/// Remove every file with the given path, returning whether one was removed
pub fn remove_file_with_path(files: &mut Vec<File>, path: &str) -> bool {
    let before = files.len();
    files.retain(|f| f.path != path);
    files.len() != before
}
