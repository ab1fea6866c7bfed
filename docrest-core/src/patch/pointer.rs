//! JSON Pointer (RFC 6901) addressing over BSON value trees.

use std::fmt;

use bson::Bson;

use crate::error::PatchError;

/// A parsed JSON Pointer such as `/profile/tags/0`.
///
/// The empty pointer `""` addresses the whole value.
#[derive(Debug, Clone, PartialEq)]
pub struct Pointer {
    raw: String,
    tokens: Vec<String>,
}

impl Pointer {
    /// Parses a pointer, unescaping `~1` to `/` and `~0` to `~`.
    pub fn parse(raw: &str) -> Result<Self, PatchError> {
        if raw.is_empty() {
            return Ok(Pointer { raw: String::new(), tokens: Vec::new() });
        }

        if !raw.starts_with('/') {
            return Err(PatchError::InvalidPointer(raw.to_string()));
        }

        let tokens = raw[1..]
            .split('/')
            .map(|token| unescape(token).ok_or_else(|| PatchError::InvalidPointer(raw.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Pointer { raw: raw.to_string(), tokens })
    }

    pub fn is_root(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Returns `true` if `self` addresses a value strictly inside `other`.
    pub fn is_inside(&self, other: &Pointer) -> bool {
        self.tokens.len() > other.tokens.len() && self.tokens.starts_with(&other.tokens)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Resolves the pointer against a value.
    pub fn get<'a>(&self, root: &'a Bson) -> Option<&'a Bson> {
        self.tokens
            .iter()
            .try_fold(root, |current, token| match current {
                Bson::Document(doc) => doc.get(token.as_str()),
                Bson::Array(items) => items.get(parse_index(token)?),
                _ => None,
            })
    }

    fn get_mut<'a>(&self, root: &'a mut Bson) -> Option<&'a mut Bson> {
        self.tokens
            .iter()
            .try_fold(root, |current, token| match current {
                Bson::Document(doc) => doc.get_mut(token.as_str()),
                Bson::Array(items) => items.get_mut(parse_index(token)?),
                _ => None,
            })
    }

    fn split_last(&self) -> Option<(Pointer, &str)> {
        let (last, parent) = self.tokens.split_last()?;

        Some((Pointer { raw: self.raw.clone(), tokens: parent.to_vec() }, last.as_str()))
    }

    /// Adds `value` at the pointer. Object members are inserted or replaced, array elements
    /// are inserted before the index, and `-` appends.
    pub fn add(&self, root: &mut Bson, value: Bson) -> Result<(), PatchError> {
        let Some((parent, last)) = self.split_last() else {
            *root = value;
            return Ok(());
        };

        match parent.get_mut(root) {
            Some(Bson::Document(doc)) => {
                doc.insert(last, value);
                Ok(())
            }
            Some(Bson::Array(items)) => {
                if last == "-" {
                    items.push(value);
                    return Ok(());
                }

                match parse_index(last) {
                    Some(index) if index <= items.len() => {
                        items.insert(index, value);
                        Ok(())
                    }
                    _ => Err(PatchError::InvalidIndex(self.raw.clone())),
                }
            }
            _ => Err(PatchError::PathNotFound(self.raw.clone())),
        }
    }

    /// Removes and returns the value at the pointer.
    pub fn remove(&self, root: &mut Bson) -> Result<Bson, PatchError> {
        let Some((parent, last)) = self.split_last() else {
            return Err(PatchError::InvalidTarget("cannot remove the whole value".to_string()));
        };

        match parent.get_mut(root) {
            Some(Bson::Document(doc)) => doc
                .remove(last)
                .ok_or_else(|| PatchError::PathNotFound(self.raw.clone())),
            Some(Bson::Array(items)) => match parse_index(last) {
                Some(index) if index < items.len() => Ok(items.remove(index)),
                _ => Err(PatchError::InvalidIndex(self.raw.clone())),
            },
            _ => Err(PatchError::PathNotFound(self.raw.clone())),
        }
    }

    /// Replaces the existing value at the pointer.
    pub fn replace(&self, root: &mut Bson, value: Bson) -> Result<(), PatchError> {
        match self.get_mut(root) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(PatchError::PathNotFound(self.raw.clone())),
        }
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn unescape(token: &str) -> Option<String> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();

    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }

    Some(out)
}

// Array indices are plain decimal without leading zeros.
fn parse_index(token: &str) -> Option<usize> {
    if token.is_empty()
        || !token.bytes().all(|b| b.is_ascii_digit())
        || (token.len() > 1 && token.starts_with('0'))
    {
        return None;
    }

    token.parse().ok()
}
