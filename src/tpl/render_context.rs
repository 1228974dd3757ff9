use crate::value::Value;

/// Scope a template is rendered in: the current value (`this`) plus the
/// `@`-prefixed data injected by block helpers such as `each`.
pub struct Context<'a> {
    this: &'a Value,
    locals: Vec<(String, Value)>,
}

impl<'a> Context<'a> {
    pub fn new(this: &'a Value) -> Self {
        Self {
            this,
            locals: Vec::new(),
        }
    }

    /// A nested scope over `this`, inheriting the current data and adding `data`.
    pub fn child<'b>(&self, this: &'b Value, data: &[(&str, Value)]) -> Context<'b> {
        let mut locals = self.locals.clone();
        locals.extend(
            data.iter()
                .map(|(k, v)| (normalize_data_key(k), v.clone())),
        );
        Context { this, locals }
    }

    pub fn this(&self) -> &'a Value {
        self.this
    }

    /// Resolves a dotted path. `None` means undefined: some segment was missing.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        if path == "this" || path == "." {
            return Some(self.this);
        }

        // 1) `this.x` and `./x` are explicit references to the current scope.
        if let Some(rest) = path
            .strip_prefix("this.")
            .or_else(|| path.strip_prefix("./"))
        {
            return Self::resolve_path(self.this, rest);
        }

        // 2) `@index`, `@first`, ... (stack structure, search backwards to support shadowing).
        if path.starts_with('@') {
            let (head, rest) = match path.split_once('.') {
                Some((head, rest)) => (head, Some(rest)),
                None => (path, None),
            };
            if let Some((_, v)) = self.locals.iter().rev().find(|(k, _)| k == head) {
                return match rest {
                    Some(rest) => Self::resolve_path(v, rest),
                    None => Some(v),
                };
            }
        }

        Self::resolve_path(self.this, path)
    }

    /// Resolve a dot-separated path within a `Value` (maps and list indices).
    fn resolve_path<'v>(mut current: &'v Value, path: &str) -> Option<&'v Value> {
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }
}

fn normalize_data_key(key: &str) -> String {
    if key.starts_with('@') {
        key.to_string()
    } else {
        format!("@{}", key)
    }
}
