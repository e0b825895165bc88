//! Template environment and function registry.
//!
//! The environment is built once at startup and shared read-only between
//! reconciliations. Besides the minijinja builtins and `minijinja-contrib`,
//! it registers the following, each usable as a function and as a filter:
//!
//! | name           | behavior                                            |
//! |----------------|-----------------------------------------------------|
//! | `b64bin`       | bytes (or text) to standard padded base64           |
//! | `utf8`         | bytes to text, invalid sequences replaced           |
//! | `b64enc`       | alias of `b64bin`                                   |
//! | `b64dec`       | standard base64 to text                             |
//! | `sha256sum`    | lowercase hex SHA-256 digest                        |
//! | `trimPrefix`   | strip a leading substring once                      |
//! | `trimSuffix`   | strip a trailing substring once                     |
//! | `nospace`      | remove all whitespace                               |
//! | `quote`        | wrap in double quotes                               |
//! | `squote`       | wrap in single quotes                               |
//! | `randAlphaNum` | random alphanumeric string, at most 4096 characters |

use std::borrow::Cow;
use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use minijinja::{AutoEscape, Environment, Error, ErrorKind, UndefinedBehavior, Value, context};
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha2::{Digest, Sha256};

/// Settings for the template environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemplateOptions {
    /// Fail rendering on undefined references or keys instead of printing nothing.
    pub strict_undefined: bool,
}

/// Immutable template environment with the full function registry.
pub struct TemplateEnvironment {
    env: Environment<'static>,
    options: TemplateOptions,
}

impl fmt::Debug for TemplateEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateEnvironment")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Default for TemplateEnvironment {
    fn default() -> Self {
        Self::new(TemplateOptions::default())
    }
}

impl TemplateEnvironment {
    pub fn new(options: TemplateOptions) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(if options.strict_undefined {
            UndefinedBehavior::Strict
        } else {
            UndefinedBehavior::Chainable
        });
        // Output is secret material, never markup.
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_keep_trailing_newline(true);
        minijinja_contrib::add_to_environment(&mut env);
        register_functions(&mut env);
        Self { env, options }
    }

    pub fn options(&self) -> TemplateOptions {
        self.options
    }

    /// Renders `source` with `references` bound in the context.
    ///
    /// `name` only appears in error messages. Syntax errors come back with
    /// [`ErrorKind::SyntaxError`].
    pub fn render(&self, name: &str, source: &str, references: &Value) -> Result<String, Error> {
        self.env.render_named_str(
            name,
            source,
            context! { references => references.clone() },
        )
    }
}

macro_rules! register {
    ($env:expr, $($name:literal => $func:expr),+ $(,)?) => {
        $(
            $env.add_function($name, $func);
            $env.add_filter($name, $func);
        )+
    };
}

fn register_functions(env: &mut Environment<'static>) {
    register!(env,
        "b64bin" => b64bin,
        "utf8" => utf8,
        "b64enc" => b64bin,
        "b64dec" => b64dec,
        "sha256sum" => sha256sum,
        "trimPrefix" => trim_prefix,
        "trimSuffix" => trim_suffix,
        "nospace" => nospace,
        "quote" => quote,
        "squote" => squote,
        "randAlphaNum" => rand_alpha_num,
    );
}

/// Raw bytes of a value. Undefined and none are empty; other non-string
/// values use their display form.
fn value_bytes(value: &Value) -> Cow<'_, [u8]> {
    if value.is_undefined() || value.is_none() {
        return Cow::Borrowed(&[]);
    }
    match value.as_bytes() {
        Some(bytes) => Cow::Borrowed(bytes),
        None => Cow::Owned(value.to_string().into_bytes()),
    }
}

fn value_text(value: &Value) -> String {
    String::from_utf8_lossy(&value_bytes(value)).into_owned()
}

fn b64bin(value: &Value) -> String {
    STANDARD.encode(value_bytes(value))
}

fn utf8(value: &Value) -> String {
    value_text(value)
}

fn b64dec(value: &Value) -> Result<String, Error> {
    let decoded = STANDARD.decode(value_bytes(value)).map_err(|err| {
        Error::new(ErrorKind::InvalidOperation, format!("b64dec: {err}"))
    })?;
    Ok(String::from_utf8_lossy(&decoded).into_owned())
}

fn sha256sum(value: &Value) -> String {
    hex::encode(Sha256::digest(value_bytes(value)))
}

fn trim_prefix(value: &Value, prefix: &str) -> String {
    let text = value_text(value);
    match text.strip_prefix(prefix) {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

fn trim_suffix(value: &Value, suffix: &str) -> String {
    let text = value_text(value);
    match text.strip_suffix(suffix) {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

fn nospace(value: &Value) -> String {
    value_text(value)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

fn quote(value: &Value) -> String {
    format!("\"{}\"", value_text(value))
}

fn squote(value: &Value) -> String {
    format!("'{}'", value_text(value))
}

/// Longest string `randAlphaNum` will generate.
pub const MAX_RANDOM_LENGTH: usize = 4096;

fn rand_alpha_num(len: usize) -> Result<String, Error> {
    if len > MAX_RANDOM_LENGTH {
        return Err(Error::new(
            ErrorKind::InvalidOperation,
            format!("randAlphaNum: length {len} exceeds {MAX_RANDOM_LENGTH}"),
        ));
    }
    Ok(rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn refs() -> Value {
        let mut db = BTreeMap::new();
        db.insert("user".to_string(), Value::from("admin"));
        db.insert("raw".to_string(), Value::from_bytes(vec![0xde, 0xad, 0xbe, 0xef]));
        db.insert("text-bytes".to_string(), Value::from_bytes(b"hello".to_vec()));
        let mut all = BTreeMap::new();
        all.insert("db".to_string(), Value::from(db));
        Value::from(all)
    }

    fn render(source: &str) -> String {
        TemplateEnvironment::default()
            .render("test", source, &refs())
            .unwrap()
    }

    #[test]
    fn test_reference_lookup() {
        assert_eq!(render("{{ references.db.user }}"), "admin");
        assert_eq!(render(r#"{{ references["db"]["user"] }}"#), "admin");
    }

    #[test]
    fn test_b64bin_and_utf8() {
        assert_eq!(render("{{ references.db.raw | b64bin }}"), "3q2+7w==");
        assert_eq!(render("{{ b64bin(references.db.raw) }}"), "3q2+7w==");
        assert_eq!(render("{{ references.db['text-bytes'] | utf8 }}"), "hello");
        assert_eq!(render("{{ references.db.user | b64enc }}"), "YWRtaW4=");
        assert_eq!(render("{{ 'YWRtaW4=' | b64dec }}"), "admin");
    }

    #[test]
    fn test_string_helpers() {
        assert_eq!(render("{{ 'v1.2' | trimPrefix('v') }}"), "1.2");
        assert_eq!(render("{{ 'app.yaml' | trimSuffix('.yaml') }}"), "app");
        assert_eq!(render("{{ ' a b\tc ' | nospace }}"), "abc");
        assert_eq!(render("{{ references.db.user | quote }}"), "\"admin\"");
        assert_eq!(render("{{ references.db.user | squote }}"), "'admin'");
        assert_eq!(
            render("{{ 'abc' | sha256sum }}"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(render("{{ randAlphaNum(12) | length }}"), "12");
        assert_eq!(
            render(&format!("{{{{ randAlphaNum({MAX_RANDOM_LENGTH}) | length }}}}")),
            MAX_RANDOM_LENGTH.to_string()
        );
    }

    #[test]
    fn test_builtin_filters_available() {
        assert_eq!(render("{{ references.db.user | upper }}"), "ADMIN");
        assert_eq!(render("{{ 'a-b' | replace('-', '_') }}"), "a_b");
    }

    #[test]
    fn test_lenient_undefined_renders_empty() {
        assert_eq!(render("[{{ references.missing.key }}]"), "[]");
        assert_eq!(render("[{{ references.db.nope | b64bin }}]"), "[]");
    }

    #[test]
    fn test_strict_undefined_fails() {
        let env = TemplateEnvironment::new(TemplateOptions {
            strict_undefined: true,
        });
        assert!(env.render("t", "{{ references.missing.key }}", &refs()).is_err());
    }

    #[test]
    fn test_output_is_not_escaped_and_keeps_newline() {
        let env = TemplateEnvironment::default();
        let out = env.render("index.html", "<{{ '&' }}>\n", &refs()).unwrap();
        assert_eq!(out, "<&>\n");
    }

    #[test]
    fn test_syntax_error_kind() {
        let err = TemplateEnvironment::default()
            .render("t", "{{ references.db.user ", &refs())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyntaxError);
    }

    #[test]
    fn test_rand_alpha_num_length_is_capped() {
        let err = TemplateEnvironment::default()
            .render("t", "{{ randAlphaNum(4000000000) }}", &refs())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert!(err.to_string().contains("exceeds 4096"));
    }

    #[test]
    fn test_b64dec_rejects_garbage() {
        let err = TemplateEnvironment::default()
            .render("t", "{{ '***' | b64dec }}", &refs())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    }
}
