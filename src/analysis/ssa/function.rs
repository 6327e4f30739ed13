//! A complete function body in SSA form.
//!
//! [`SsaFunction`] owns the blocks, the links between them and the variable
//! table. Block `0` is the entry block. Blocks are addressed by index, links by
//! [`LinkId`] and variables by [`SsaVarId`], so all cross references are plain
//! indices that stay valid while operations are rewritten.
//!
//! # Thread Safety
//!
//! `SsaFunction` is `Send` and `Sync`; passes take it by `&mut` for the
//! duration of a transformation.

use std::{collections::HashSet, fmt};

use crate::{
    analysis::ssa::{
        ConstValue, Link, LinkId, Operand, SsaBlock, SsaType, SsaVarId, SsaVariable,
    },
    Error, Result,
};

/// A function body: blocks, links and variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsaFunction {
    name: String,
    blocks: Vec<SsaBlock>,
    links: Vec<Link>,
    variables: Vec<SsaVariable>,
}

impl SsaFunction {
    /// Creates an empty function.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blocks: Vec::new(),
            links: Vec::new(),
            variables: Vec::new(),
        }
    }

    pub(crate) fn from_parts(
        name: String,
        blocks: Vec<SsaBlock>,
        links: Vec<Link>,
        variables: Vec<SsaVariable>,
    ) -> Self {
        Self {
            name,
            blocks,
            links,
            variables,
        }
    }

    /// Returns the function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the index of the entry block.
    #[must_use]
    pub const fn entry(&self) -> usize {
        0
    }

    /// Returns all blocks, indexed by block id.
    #[must_use]
    pub fn blocks(&self) -> &[SsaBlock] {
        &self.blocks
    }

    /// Returns the number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the block with the given index.
    #[must_use]
    pub fn block(&self, id: usize) -> Option<&SsaBlock> {
        self.blocks.get(id)
    }

    /// Returns a mutable reference to the block with the given index.
    pub fn block_mut(&mut self, id: usize) -> Option<&mut SsaBlock> {
        self.blocks.get_mut(id)
    }

    /// Appends a block. Its id should equal its position.
    pub fn add_block(&mut self, block: SsaBlock) {
        self.blocks.push(block);
    }

    /// Returns all links, indexed by link id.
    #[must_use]
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Returns the link with the given id.
    #[must_use]
    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.index())
    }

    /// Returns a mutable reference to the link with the given id.
    pub fn link_mut(&mut self, id: LinkId) -> Option<&mut Link> {
        self.links.get_mut(id.index())
    }

    /// Adds a link from `source` to `target` and registers it as the next exit
    /// of `source`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBlock`] if `source` does not exist.
    pub fn add_link(
        &mut self,
        source: usize,
        target: usize,
        args: Vec<Operand>,
        exit_case: Option<ConstValue>,
    ) -> Result<LinkId> {
        let id = LinkId::new(self.links.len());
        let block = self
            .blocks
            .get_mut(source)
            .ok_or(Error::InvalidBlock(source))?;
        block.add_exit(id);

        let mut link = Link::new(id, source, target, args);
        link.exit_case = exit_case;
        self.links.push(link);
        Ok(id)
    }

    /// Returns the links leaving `block`, in exit order.
    pub fn exits_of(&self, block: usize) -> impl Iterator<Item = &Link> + '_ {
        self.blocks
            .get(block)
            .into_iter()
            .flat_map(|b| b.exits().iter())
            .filter_map(|id| self.link(*id))
    }

    /// Returns the variable table.
    #[must_use]
    pub fn variables(&self) -> &[SsaVariable] {
        &self.variables
    }

    /// Returns the metadata of a variable.
    #[must_use]
    pub fn variable(&self, id: SsaVarId) -> Option<&SsaVariable> {
        self.variables.get(id.index())
    }

    /// Returns a mutable reference to the metadata of a variable.
    pub fn variable_mut(&mut self, id: SsaVarId) -> Option<&mut SsaVariable> {
        self.variables.get_mut(id.index())
    }

    /// Returns the number of variables.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Allocates a fresh variable of the given type.
    pub fn new_variable(&mut self, var_type: SsaType) -> SsaVarId {
        let id = SsaVarId::new(self.variables.len());
        self.variables.push(SsaVariable::new(id, var_type));
        id
    }

    /// Allocates a fresh variable of the given type with a name hint.
    pub fn new_named_variable(&mut self, var_type: SsaType, name: impl Into<String>) -> SsaVarId {
        let id = SsaVarId::new(self.variables.len());
        self.variables.push(SsaVariable::named(id, var_type, name));
        id
    }

    /// Returns the type of a variable.
    #[must_use]
    pub fn var_type(&self, id: SsaVarId) -> Option<&SsaType> {
        self.variable(id).map(SsaVariable::var_type)
    }

    /// Returns the type of an operand.
    #[must_use]
    pub fn operand_type(&self, operand: &Operand) -> Option<SsaType> {
        match operand {
            Operand::Var(var) => self.var_type(*var).cloned(),
            Operand::Const(value) => Some(value.const_type()),
        }
    }

    /// Returns the total number of operations across all blocks.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.blocks.iter().map(|b| b.operations().len()).sum()
    }

    /// Replaces every use of `old` with `new` in operations, exit switches and
    /// link arguments. Returns the number of replaced uses.
    pub fn replace_uses(&mut self, old: SsaVarId, new: &Operand) -> usize {
        let mut count = 0;
        for block in &mut self.blocks {
            for op in block.operations_mut() {
                count += op.replace_uses(old, new);
            }
            if let Some(switch) = block.exit_switch_mut() {
                if switch.uses(old) {
                    *switch = new.clone();
                    count += 1;
                }
            }
        }
        for link in &mut self.links {
            for arg in &mut link.args {
                if arg.uses(old) {
                    *arg = new.clone();
                    count += 1;
                }
            }
        }
        count
    }

    /// Returns `true` if `var` is used anywhere: by an operation, an exit
    /// switch or a link argument.
    #[must_use]
    pub fn is_used(&self, var: SsaVarId) -> bool {
        self.blocks.iter().any(|b| {
            b.operations().iter().any(|op| op.uses(var))
                || b.exit_switch().is_some_and(|s| s.uses(var))
        }) || self
            .links
            .iter()
            .any(|l| l.args.iter().any(|a| a.uses(var)))
    }

    /// Checks the structural well-formedness of the function.
    ///
    /// The checks are, in order: block ids match their positions; every exit
    /// names an existing link leaving that block; for every link, the target
    /// and source blocks exist, the source lists the link among its exits and
    /// the argument count matches the target's parameter count; every
    /// operation has its opcode's arity; every variable is defined at most once
    /// and exists in the variable table.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidLink`] for an exit naming a missing link
    /// - [`Error::InvalidBlock`] for a link with a missing endpoint
    /// - [`Error::ArityMismatch`] for a link with the wrong argument count
    /// - [`Error::Malformed`] for everything else
    pub fn validate(&self) -> Result<()> {
        if self.blocks.is_empty() {
            return Err(malformed_error!("function {} has no entry block", self.name));
        }

        for (index, block) in self.blocks.iter().enumerate() {
            if block.id() != index {
                return Err(malformed_error!(
                    "block at position {} has id {}",
                    index,
                    block.id()
                ));
            }
            for &exit in block.exits() {
                let link = self.link(exit).ok_or(Error::InvalidLink(exit))?;
                if link.source != index {
                    return Err(malformed_error!(
                        "block {} lists {} which leaves block {}",
                        index,
                        exit,
                        link.source
                    ));
                }
            }
        }

        for link in &self.links {
            let target = self
                .block(link.target)
                .ok_or(Error::InvalidBlock(link.target))?;
            let source = self
                .block(link.source)
                .ok_or(Error::InvalidBlock(link.source))?;
            if !source.exits().contains(&link.id) {
                return Err(malformed_error!(
                    "{} is not an exit of its source block {}",
                    link.id,
                    link.source
                ));
            }
            if link.args.len() != target.params().len() {
                return Err(Error::ArityMismatch {
                    link: link.id,
                    target: link.target,
                    expected: target.params().len(),
                    found: link.args.len(),
                });
            }
        }

        let mut defined = HashSet::with_capacity(self.variables.len());
        for block in &self.blocks {
            for op in block.operations() {
                if let Some(arity) = op.opcode().arity() {
                    if op.args().len() != arity {
                        return Err(malformed_error!(
                            "`{}` in block {} takes {} arguments",
                            op,
                            block.id(),
                            arity
                        ));
                    }
                }
                if op.result().is_some() && !op.opcode().has_result() {
                    return Err(malformed_error!("`{}` cannot define a result", op));
                }
            }
            for var in block.defined_vars() {
                if self.variable(var).is_none() {
                    return Err(malformed_error!("{} is not in the variable table", var));
                }
                if !defined.insert(var) {
                    return Err(malformed_error!("{} is defined more than once", var));
                }
            }
        }

        Ok(())
    }
}

impl fmt::Display for SsaFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "function {}:", self.name)?;
        for block in &self.blocks {
            write!(f, "{block}")?;
            for link in self.exits_of(block.id()) {
                writeln!(f, "  {link}")?;
            }
        }
        Ok(())
    }
}
