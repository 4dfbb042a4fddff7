//! A thin construction helper, in the spirit of `abstraps`'s
//! `OperationBuilder`: a cursor over a single function under construction,
//! used by tests to hand-assemble IR without juggling ids themselves.

use super::{Block, BlockId, Convention, Function, InstId, Opcode, Reg, SourceSpan, Ty};

pub struct FunctionBuilder {
    function: Function,
    cursor: BlockId,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>, params: Vec<(Convention, Ty)>) -> Self {
        let mut function = Function {
            name: name.into(),
            params,
            blocks: Vec::new(),
            next_id: 0,
        };
        let entry = function.push_block();
        FunctionBuilder { function, cursor: entry }
    }

    pub fn entry(&self) -> BlockId {
        self.function.entry()
    }

    pub fn block(&mut self) -> BlockId {
        self.function.push_block()
    }

    pub fn switch_to(&mut self, block: BlockId) -> &mut Self {
        self.cursor = block;
        self
    }

    /// Push an instruction and return its single result register. Use
    /// [`push_multi`](Self::push_multi) for `destructure`.
    pub fn push(&mut self, opcode: Opcode, span: SourceSpan) -> Reg {
        Reg::Val(self.push_multi(opcode, span), 0)
    }

    pub fn push_multi(&mut self, opcode: Opcode, span: SourceSpan) -> InstId {
        let id = self.function.fresh_id();
        self.function
            .block_mut(self.cursor)
            .instructions
            .push(super::Instruction { id, opcode, span });
        id
    }

    pub fn current_block(&self) -> &Block {
        self.function.block(self.cursor)
    }

    /// Finish construction, checking that every block ends in a
    /// terminator opcode — the one well-formedness property the IR
    /// module itself is responsible for (everything else is the
    /// out-of-scope type checker's job).
    pub fn finish(self) -> color_eyre::Result<Function> {
        for block in &self.function.blocks {
            let Some(last) = block.instructions.last() else {
                color_eyre::eyre::bail!("block {} in function `{}` has no instructions", block.id, self.function.name);
            };
            if !last.opcode.is_terminator() {
                color_eyre::eyre::bail!(
                    "block {} in function `{}` does not end in a terminator opcode",
                    block.id,
                    self.function.name
                );
            }
        }
        Ok(self.function)
    }
}
