/// One stage of a `{{ value | name arg1 arg2 }}` pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub name: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    Text(String),
    /// `{{path | filter ...}}`. When `args` is non-empty, `path` names an inline
    /// helper invoked with those args (`{{helper a b}}`).
    Var {
        path: String,
        args: Vec<String>,
        filters: Vec<Filter>,
    },
    Block {
        helper: String,
        args: Vec<String>,
        children: Vec<AstNode>,
    },
    Partial {
        name: String,
        context: Option<String>,
    },
}
