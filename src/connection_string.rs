//! Connection string tokenizer (§6): whitespace-separated `key=value` pairs,
//! values optionally quoted with `'` or `"` to embed whitespace. No escape
//! sequence inside a quoted value — the same quote character that opened it
//! closes it.

use std::collections::HashMap;

use crate::error::Error;

/// A parsed connection string: an ordered set of `key=value` pairs. Ordering
/// is preserved (backed by `indexmap`) so a backend that cares about
/// first-seen-wins duplicates can rely on iteration order.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTokens {
  pairs: indexmap::IndexMap<String, String>,
}

impl ConnectionTokens {
  pub fn get(&self, key: &str) -> Option<&str> {
    self.pairs.get(key).map(|s| s.as_str())
  }

  pub fn contains(&self, key: &str) -> bool {
    self.pairs.contains_key(key)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn as_map(&self) -> HashMap<String, String> {
    self.pairs.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
  }
}

/// Parses a connection string of the form `key1=value1 key2="quoted value"`.
/// Fails with `Error::invalid_connection_string` on a token with no `=` or an
/// unterminated quote (§6).
pub fn parse(input: &str) -> Result<ConnectionTokens, Error> {
  let mut pairs = indexmap::IndexMap::new();
  let chars: Vec<char> = input.chars().collect();
  let mut i = 0usize;

  while i < chars.len() {
    while i < chars.len() && chars[i].is_whitespace() {
      i += 1;
    }
    if i >= chars.len() {
      break;
    }

    let key_start = i;
    while i < chars.len() && chars[i] != '=' && !chars[i].is_whitespace() {
      i += 1;
    }
    if i >= chars.len() || chars[i] != '=' {
      return Err(Error::invalid_connection_string(format!(
        "expected '=' after key starting at position {key_start}"
      )));
    }
    let key: String = chars[key_start..i].iter().collect();
    i += 1; // skip '='

    let value = if i < chars.len() && (chars[i] == '\'' || chars[i] == '"') {
      let quote = chars[i];
      i += 1;
      let value_start = i;
      while i < chars.len() && chars[i] != quote {
        i += 1;
      }
      if i >= chars.len() {
        return Err(Error::invalid_connection_string(format!("unterminated {quote} quote for key \"{key}\"")));
      }
      let value: String = chars[value_start..i].iter().collect();
      i += 1; // skip closing quote
      value
    } else {
      let value_start = i;
      while i < chars.len() && !chars[i].is_whitespace() {
        i += 1;
      }
      chars[value_start..i].iter().collect()
    };

    if key.is_empty() {
      return Err(Error::invalid_connection_string("empty key"));
    }
    pairs.insert(key, value);
  }

  Ok(ConnectionTokens { pairs })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_bare_values() {
    let tokens = parse("host=localhost port=5432").unwrap();
    assert_eq!(tokens.get("host"), Some("localhost"));
    assert_eq!(tokens.get("port"), Some("5432"));
  }

  #[test]
  fn test_parse_quoted_value_with_whitespace() {
    let tokens = parse(r#"dbname="my database" user='jane doe'"#).unwrap();
    assert_eq!(tokens.get("dbname"), Some("my database"));
    assert_eq!(tokens.get("user"), Some("jane doe"));
  }

  #[test]
  fn test_parse_empty_value_allowed() {
    let tokens = parse("password=").unwrap();
    assert_eq!(tokens.get("password"), Some(""));
  }

  #[test]
  fn test_parse_missing_equals_fails() {
    assert!(parse("hostlocalhost").is_err());
  }

  #[test]
  fn test_parse_unterminated_quote_fails() {
    assert!(parse(r#"dbname="unterminated"#).is_err());
  }

  #[test]
  fn test_parse_reconnect_flag() {
    let tokens = parse("host=db1 reconnect=true").unwrap();
    assert_eq!(tokens.get("reconnect"), Some("true"));
  }
}
