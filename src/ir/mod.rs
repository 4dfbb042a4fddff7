//! The minimal typed IR the Definite Initialization pass operates on.
//!
//! This plays the role of the "IR builder collaborator" left at its
//! interface by the surrounding design: a lexer, parser, name resolver,
//! type checker, and later passes (borrow checking, lifetime-of-access,
//! code generation) are all out of scope. What remains is just enough
//! structure — a closed, fourteen-opcode instruction set, basic blocks,
//! functions with conventioned parameters, and a fixed record layout per
//! type — for the analysis (and its tests) to have something to run on.

mod builder;

pub use builder::FunctionBuilder;

use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;

pub type FieldPath = SmallVec<[usize; 4]>;
pub type Operands = SmallVec<[Reg; 4]>;
pub type Conventions = SmallVec<[Convention; 4]>;

/// A type in the analyzed program. Records carry their stored property
/// types inline (rather than through a separate name table) so `Ty::at_path`
/// can answer layout queries on its own.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    Scalar(String),
    Record(String, Vec<Ty>),
}

impl Ty {
    pub fn scalar(name: impl Into<String>) -> Ty {
        Ty::Scalar(name.into())
    }

    pub fn record(name: impl Into<String>, fields: Vec<Ty>) -> Ty {
        Ty::Record(name.into(), fields)
    }

    pub fn name(&self) -> &str {
        match self {
            Ty::Scalar(n) => n,
            Ty::Record(n, _) => n,
        }
    }

    pub fn stored_property_types(&self) -> &[Ty] {
        match self {
            Ty::Scalar(_) => &[],
            Ty::Record(_, fields) => fields,
        }
    }

    /// Resolve the type at a record path, one field index per path element.
    pub fn at_path(&self, path: &[usize]) -> &Ty {
        let mut cur = self;
        for &idx in path {
            cur = cur
                .stored_property_types()
                .get(idx)
                .unwrap_or_else(|| panic!("precondition violation: field path {path:?} out of bounds for {cur}"));
        }
        cur
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A parameter-passing convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Convention {
    Let,
    Inout,
    Set,
    Sink,
    Yielded,
}

impl fmt::Display for Convention {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Convention::Let => "let",
            Convention::Inout => "inout",
            Convention::Set => "set",
            Convention::Sink => "sink",
            Convention::Yielded => "yielded",
        };
        write!(f, "{s}")
    }
}

/// A block address, unique within a function.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// An instruction address, unique within a function for its entire
/// lifetime, including instructions inserted by repair. A single
/// globally-unique id gives every instruction stable identity without
/// needing to renumber positions every time a repair inserts an
/// instruction ahead of others in the same block.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct InstId(pub u32);

impl fmt::Display for InstId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A register: either a function argument slot or the (possibly
/// multi-valued) result of an instruction. `component` selects among the
/// several results `destructure` can produce; every other result-bearing
/// opcode only ever uses component `0`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Reg {
    Arg(u32),
    Val(InstId, u16),
}

impl Reg {
    pub fn val(id: InstId) -> Reg {
        Reg::Val(id, 0)
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Reg::Arg(i) => write!(f, "arg{i}"),
            Reg::Val(id, 0) => write!(f, "{id}"),
            Reg::Val(id, c) => write!(f, "{id}#{c}"),
        }
    }
}

/// A source location, used only for diagnostics — never compared for
/// program semantics.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SourceSpan {
    pub file: String,
    pub line: u32,
    pub col: u32,
}

impl SourceSpan {
    pub fn new(file: impl Into<String>, line: u32, col: u32) -> Self {
        SourceSpan {
            file: file.into(),
            line,
            col,
        }
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

/// The closed fourteen-opcode set this IR supports. There is no catch-all
/// variant — an opcode outside this set is unrepresentable, turning "any
/// other opcode is a precondition violation" into a compile-time guarantee
/// instead of a runtime one.
#[derive(Clone, Debug)]
pub enum Opcode {
    AllocStack {
        ty: Ty,
    },
    Borrow {
        cap: Convention,
        source: Reg,
        path: FieldPath,
    },
    Load {
        ty: Ty,
        source: Reg,
        path: FieldPath,
    },
    Store {
        object: Reg,
        target: Reg,
    },
    Record {
        operands: Operands,
    },
    Destructure {
        object: Reg,
        arity: usize,
    },
    Call {
        operands: Operands,
        conventions: Conventions,
    },
    Deinit {
        object: Reg,
    },
    DeallocStack {
        location: Reg,
    },
    CondBranch {
        cond: Reg,
        then_block: BlockId,
        else_block: BlockId,
    },
    Branch {
        target: BlockId,
    },
    Return {
        value: Option<Reg>,
    },
    EndBorrow {
        source: Reg,
    },
    Unreachable,
}

impl Opcode {
    /// Number of result registers this opcode produces (`destructure` may
    /// produce more than one; every other opcode produces zero or one).
    pub fn result_arity(&self) -> usize {
        match self {
            Opcode::AllocStack { .. }
            | Opcode::Borrow { .. }
            | Opcode::Load { .. }
            | Opcode::Record { .. }
            | Opcode::Call { .. } => 1,
            Opcode::Destructure { arity, .. } => *arity,
            Opcode::Store { .. }
            | Opcode::Deinit { .. }
            | Opcode::DeallocStack { .. }
            | Opcode::CondBranch { .. }
            | Opcode::Branch { .. }
            | Opcode::Return { .. }
            | Opcode::EndBorrow { .. }
            | Opcode::Unreachable => 0,
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Opcode::CondBranch { .. } | Opcode::Branch { .. } | Opcode::Return { .. } | Opcode::Unreachable
        )
    }
}

#[derive(Clone, Debug)]
pub struct Instruction {
    pub id: InstId,
    pub opcode: Opcode,
    pub span: SourceSpan,
}

impl Instruction {
    pub fn result(&self, component: u16) -> Reg {
        Reg::Val(self.id, component)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.opcode.result_arity() > 0 {
            write!(f, "{} = ", self.id)?;
        }
        write!(f, "{:?}", self.opcode)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Block {
    pub id: BlockId,
    pub instructions: Vec<Instruction>,
}

impl Block {
    pub fn terminator(&self) -> &Instruction {
        self.instructions
            .last()
            .expect("precondition violation: block has no instructions")
    }
}

#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
    pub params: Vec<(Convention, Ty)>,
    pub blocks: Vec<Block>,
    next_id: u32,
}

impl Function {
    pub fn entry(&self) -> BlockId {
        self.blocks
            .first()
            .expect("precondition violation: function has no blocks")
            .id
    }

    pub fn block(&self, id: BlockId) -> &Block {
        self.blocks
            .iter()
            .find(|b| b.id == id)
            .unwrap_or_else(|| panic!("precondition violation: no block {id} in function {}", self.name))
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        self.blocks
            .iter_mut()
            .find(|b| b.id == id)
            .unwrap_or_else(|| panic!("precondition violation: no block {id}"))
    }

    pub fn push_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block {
            id,
            instructions: Vec::new(),
        });
        id
    }

    pub fn fresh_id(&mut self) -> InstId {
        let id = InstId(self.next_id);
        self.next_id += 1;
        id
    }

    /// The pass's only sanctioned mutation: insert a brand-new instruction
    /// immediately before an existing one. No deletion, no reordering.
    pub fn insert_before(&mut self, before: InstId, opcode: Opcode, span: SourceSpan) -> anyhow::Result<InstId> {
        for block in &mut self.blocks {
            if let Some(pos) = block.instructions.iter().position(|i| i.id == before) {
                let id = InstId(self.next_id);
                self.next_id += 1;
                block.instructions.insert(pos, Instruction { id, opcode, span });
                return Ok(id);
            }
        }
        anyhow::bail!("insert_before: no instruction {before} in function {}", self.name)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct FunctionId(pub u32);

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "fn{}", self.0)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Module {
    pub functions: BTreeMap<FunctionId, Function>,
}

impl Module {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(&mut self, function: Function) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        self.functions.insert(id, function);
        id
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        self.functions
            .get(&id)
            .unwrap_or_else(|| panic!("precondition violation: unknown function {id}"))
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut Function {
        self.functions
            .get_mut(&id)
            .unwrap_or_else(|| panic!("precondition violation: unknown function {id}"))
    }
}
