#[derive(Debug)]
pub struct Grammar {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug)]
pub enum Stmt {
    StartDesc(StartDesc),
    InheritDesc(InheritDesc),
    RuleDesc(RuleDesc),
}

#[derive(Debug)]
pub struct StartDesc {
    pub name: String,
}

#[derive(Debug)]
pub struct InheritDesc {
    pub idents: Vec<String>,
}

#[derive(Debug)]
pub struct RuleDesc {
    pub left: String,
    pub productions: Vec<Production>,
}

#[derive(Debug)]
pub struct Production {
    pub elems: Vec<ProductionElem>,
}

#[derive(Debug, PartialEq)]
pub enum ProductionElem {
    Ident(String),
    Action(u16),
    Empty,
}
