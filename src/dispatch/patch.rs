//! # Structural patches between two state snapshots.
//!
//! [`diff`] compares two `serde_json::Value` trees and emits ordered
//! [`Patch`]es; [`apply_patches`] replays them onto a copy of the old tree.
//!
//! ## Rules
//! - Objects: removed keys → `Remove`, added keys → `Add`, shared keys recurse.
//! - Arrays: same length → recurse per index; otherwise the whole array is `Replace`d.
//! - Anything else: `Replace` when values differ.
//! - `diff(a, b)` replayed onto `a` yields `b`.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::PatchError;

/// One step of a path into a JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Object member.
    Key(String),
    /// Array element.
    Index(usize),
}

/// Patch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
}

/// A single structural change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Patch {
    pub op: PatchOp,
    pub path: Vec<PathSegment>,
    /// New value (`Null` for `Remove`).
    pub value: Value,
}

impl Patch {
    /// Renders the path as a JSON pointer (`/engines/0/ready`).
    pub fn pointer(&self) -> String {
        render(&self.path)
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.op, self.pointer())
    }
}

fn render(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for seg in path {
        out.push('/');
        match seg {
            PathSegment::Key(k) => out.push_str(&k.replace('~', "~0").replace('/', "~1")),
            PathSegment::Index(i) => out.push_str(&i.to_string()),
        }
    }
    out
}

/// Computes the patches turning `before` into `after`, appending to `out`.
pub fn diff(before: &Value, after: &Value, out: &mut Vec<Patch>) {
    let mut path = Vec::new();
    diff_at(&mut path, before, after, out);
}

fn diff_at(path: &mut Vec<PathSegment>, before: &Value, after: &Value, out: &mut Vec<Patch>) {
    match (before, after) {
        (Value::Object(old), Value::Object(new)) => {
            for key in old.keys() {
                if !new.contains_key(key) {
                    path.push(PathSegment::Key(key.clone()));
                    out.push(Patch {
                        op: PatchOp::Remove,
                        path: path.clone(),
                        value: Value::Null,
                    });
                    path.pop();
                }
            }
            for (key, new_val) in new {
                path.push(PathSegment::Key(key.clone()));
                match old.get(key) {
                    Some(old_val) => diff_at(path, old_val, new_val, out),
                    None => out.push(Patch {
                        op: PatchOp::Add,
                        path: path.clone(),
                        value: new_val.clone(),
                    }),
                }
                path.pop();
            }
        }
        (Value::Array(old), Value::Array(new)) if old.len() == new.len() => {
            for (i, (o, n)) in old.iter().zip(new).enumerate() {
                path.push(PathSegment::Index(i));
                diff_at(path, o, n, out);
                path.pop();
            }
        }
        _ if before != after => out.push(Patch {
            op: PatchOp::Replace,
            path: path.clone(),
            value: after.clone(),
        }),
        _ => {}
    }
}

/// Replays `patches` onto `target` in order.
pub fn apply_patches(target: &mut Value, patches: &[Patch]) -> Result<(), PatchError> {
    for patch in patches {
        apply_one(target, patch)?;
    }
    Ok(())
}

fn apply_one(target: &mut Value, patch: &Patch) -> Result<(), PatchError> {
    let fail = |reason| PatchError {
        path: patch.pointer(),
        reason,
    };

    let Some((last, parents)) = patch.path.split_last() else {
        return match patch.op {
            PatchOp::Remove => Err(fail("cannot remove the document root")),
            PatchOp::Add | PatchOp::Replace => {
                *target = patch.value.clone();
                Ok(())
            }
        };
    };

    let mut node = target;
    for seg in parents {
        node = match (seg, node) {
            (PathSegment::Key(k), Value::Object(map)) => map.get_mut(k).ok_or_else(|| fail("missing key"))?,
            (PathSegment::Index(i), Value::Array(arr)) => arr.get_mut(*i).ok_or_else(|| fail("index out of bounds"))?,
            _ => return Err(fail("segment does not match container type")),
        };
    }

    match (last, node, patch.op) {
        (PathSegment::Key(k), Value::Object(map), PatchOp::Remove) => {
            map.remove(k).map(|_| ()).ok_or_else(|| fail("missing key"))
        }
        (PathSegment::Key(k), Value::Object(map), PatchOp::Add | PatchOp::Replace) => {
            map.insert(k.clone(), patch.value.clone());
            Ok(())
        }
        (PathSegment::Index(i), Value::Array(arr), PatchOp::Replace) => {
            let slot = arr.get_mut(*i).ok_or_else(|| fail("index out of bounds"))?;
            *slot = patch.value.clone();
            Ok(())
        }
        (PathSegment::Index(i), Value::Array(arr), PatchOp::Add) if *i <= arr.len() => {
            arr.insert(*i, patch.value.clone());
            Ok(())
        }
        (PathSegment::Index(i), Value::Array(arr), PatchOp::Remove) if *i < arr.len() => {
            arr.remove(*i);
            Ok(())
        }
        _ => Err(fail("segment does not match container type")),
    }
}
