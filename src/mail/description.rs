// src/mail/description.rs

use std::borrow::Cow;
use std::fmt::{self, Write as _};
use std::sync::Arc;

/// Argument captured for later rendering into a [`MailDescription`].
pub type DescriptionArg = Arc<dyn fmt::Display + Send + Sync + 'static>;

/// Human readable description of a mail, rendered lazily.
///
/// The template and its arguments are captured at submission time and only
/// formatted when the description is displayed (error messages, logging).
/// `{}` placeholders are replaced by the arguments in order, `{{` and `}}`
/// produce literal braces. A placeholder without a matching argument is
/// rendered as `{}` and surplus arguments are ignored.
#[derive(Clone)]
pub struct MailDescription {
  template: Cow<'static, str>,
  args: Vec<DescriptionArg>,
}

impl MailDescription {
  pub fn new(template: impl Into<Cow<'static, str>>) -> Self {
    Self {
      template: template.into(),
      args: Vec::new(),
    }
  }

  /// Appends an argument for the next unfilled `{}` placeholder.
  pub fn arg<T>(mut self, value: T) -> Self
  where
    T: fmt::Display + Send + Sync + 'static,
  {
    self.args.push(Arc::new(value));
    self
  }

  /// The raw, unformatted template.
  pub fn template(&self) -> &str {
    &self.template
  }

  pub fn arg_count(&self) -> usize {
    self.args.len()
  }

  /// Formats the description. Same output as `to_string()`.
  pub fn render(&self) -> String {
    self.to_string()
  }
}

impl fmt::Display for MailDescription {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.args.is_empty() && !self.template.contains(['{', '}']) {
      return f.write_str(&self.template);
    }

    let mut args = self.args.iter();
    let mut chars = self.template.chars().peekable();
    while let Some(c) = chars.next() {
      match (c, chars.peek().copied()) {
        ('{', Some('{')) => {
          chars.next();
          f.write_char('{')?;
        }
        ('}', Some('}')) => {
          chars.next();
          f.write_char('}')?;
        }
        ('{', Some('}')) => {
          chars.next();
          match args.next() {
            Some(arg) => write!(f, "{}", arg)?,
            None => f.write_str("{}")?,
          }
        }
        (other, _) => f.write_char(other)?,
      }
    }
    Ok(())
  }
}

impl fmt::Debug for MailDescription {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("MailDescription").field(&self.to_string()).finish()
  }
}

impl From<&'static str> for MailDescription {
  fn from(template: &'static str) -> Self {
    Self::new(template)
  }
}

impl From<String> for MailDescription {
  fn from(template: String) -> Self {
    Self::new(template)
  }
}

/// Builds a [`MailDescription`] from a template and arguments without formatting it.
///
/// ```
/// let desc = taskmail::describe!("checkpoint {} for operator {}", 42, "map");
/// assert_eq!(desc.to_string(), "checkpoint 42 for operator map");
/// ```
#[macro_export]
macro_rules! describe {
  ($template:expr $(,)?) => {
    $crate::mail::MailDescription::new($template)
  };
  ($template:expr, $($arg:expr),+ $(,)?) => {
    $crate::mail::MailDescription::new($template)$(.arg($arg))+
  };
}
