//! Target-independent code generation. Function definitions are emitted
//! after the main body, each in a frame of its own.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::backend::{Backend, Branch, Literal, LoopLabels, Operands, Slot, SlotName};
use crate::error::{CompileError, CompileResult};
use crate::grammar::{Construct, Terminal};
use crate::symbols::{SymbolId, SymbolTable, ValueType};
use crate::tree::{NodeId, Tree};

pub mod pool;
pub mod registry;
pub mod scope;
pub mod writer;

use pool::StringPool;
use registry::{Occupant, Registry};
use scope::{Entry, Scope, Variable, VariableId, VariableKind};
use writer::Writer;

/// Allocation state of the main program or of one function body.
struct Frame {
    registry: Registry,
    scope: Scope,
    variables: Vec<Variable>,
}

impl Frame {
    fn new(capacity: Option<usize>) -> Self {
        Self {
            registry: Registry::new(capacity),
            scope: Scope::new(),
            variables: Vec::new(),
        }
    }
}

pub struct Generator<'a> {
    backend: &'a dyn Backend,
    tree: &'a Tree,
    symbols: &'a mut SymbolTable,
    out: Writer,
    pool: StringPool,
    frame: Frame,
    capacity: Option<usize>,
    labels: usize,
    hidden: usize,
    pending: VecDeque<SymbolId>,
}

impl<'a> Generator<'a> {
    pub fn new(
        backend: &'a dyn Backend,
        tree: &'a Tree,
        symbols: &'a mut SymbolTable,
        registers: Option<usize>,
    ) -> CompileResult<Self> {
        // Targets without a default count keep every value in a host
        // variable and never spill.
        let capacity = backend
            .default_registers()
            .map(|default| registers.unwrap_or(default));
        if capacity.is_some_and(|capacity| capacity < 2) {
            return Err(CompileError::AllocatorInvariant {
                message: "at least two registers are required",
            });
        }
        if let (Some(capacity), Some(max)) = (capacity, backend.max_registers())
            && capacity > max
        {
            return Err(CompileError::Unsupported {
                target: backend.name(),
                feature: "that many registers",
            });
        }
        debug!(target = backend.name(), ?capacity, "register pool");
        Ok(Self {
            backend,
            tree,
            symbols,
            out: Writer::new(backend.indent_unit(), backend.comment_prefix()),
            pool: StringPool::collect(tree),
            frame: Frame::new(capacity),
            capacity,
            labels: 0,
            hidden: 0,
            pending: VecDeque::new(),
        })
    }

    pub fn assemble(mut self) -> CompileResult<String> {
        let backend = self.backend;
        backend.header(&mut self.out);
        backend.io_setup(&mut self.out);
        backend.data_section(&mut self.out, &self.pool);
        backend.main_begin(&mut self.out);
        if let Some(root) = self.tree.root() {
            for statement in self.tree.children(root) {
                self.statement(statement)?;
            }
        }
        backend.main_end(&mut self.out);

        let mut emitted = Vec::new();
        while let Some(function) = self.pending.pop_front() {
            if emitted.contains(&function) {
                return Err(CompileError::Unsupported {
                    target: backend.name(),
                    feature: "redefining a function",
                });
            }
            self.function(function)?;
            emitted.push(function);
        }
        backend.footer(&mut self.out);

        debug!(
            target = backend.name(),
            functions = emitted.len(),
            strings = self.pool.entries().count(),
            "assembled program"
        );
        Ok(self.out.finish())
    }

    fn statement(&mut self, id: NodeId) -> CompileResult<()> {
        let tree = self.tree;
        let node = tree.get(id);
        trace!(construct = node.construct.name(), "emitting statement");
        match node.construct {
            Construct::VarDecl => self.declaration(id)?,
            Construct::VarSet => {
                let value = self.child(id, 0, "value")?;
                let symbol = self.symbol_of(id)?;
                let var = self.expression(value)?;
                let reg = self.ensure(var)?;
                self.assign_to(symbol, var, reg)?;
            }
            Construct::Input => {
                let name = self.child(id, 0, "variable")?;
                let symbol = self.symbol_of(name)?;
                let temp = self.new_variable(VariableKind::Temp);
                let reg = self.allocate(temp)?;
                self.backend.input(&mut self.out, &self.backend.register(reg));
                if self.frame.scope.resolve(symbol).is_some() {
                    self.assign_to(symbol, temp, reg)?;
                } else {
                    self.declare(symbol, temp, reg);
                }
            }
            Construct::Output => {
                let value = self.child(id, 0, "operand")?;
                let var = self.expression(value)?;
                let reg = self.ensure(var)?;
                let ty = self.type_of(value);
                self.backend
                    .output(&mut self.out, &self.backend.register(reg), ty)?;
                self.release_temp(var);
            }
            Construct::If => self.conditional(id)?,
            Construct::Loop => {
                if node.terminal() == Some(Terminal::For) {
                    self.counting_loop(id)?;
                } else {
                    self.while_loop(id)?;
                }
            }
            Construct::FuncDef => {
                let name = self.child(id, 0, "name")?;
                let symbol = self.symbol_of(name)?;
                self.symbols.get_mut(symbol).definition = Some(id);
                self.pending.push_back(symbol);
            }
            Construct::FuncCall => self.call(id)?,
            Construct::Scope => self.block(id)?,
            _ => {
                return Err(CompileError::AllocatorInvariant {
                    message: "expression in statement position",
                });
            }
        }
        self.end_statement();
        Ok(())
    }

    fn declaration(&mut self, id: NodeId) -> CompileResult<()> {
        let name = self.child(id, 0, "name")?;
        let value = self.child(id, 1, "value")?;
        let symbol = self.symbol_of(name)?;
        let var = self.expression(value)?;
        let reg = self.ensure(var)?;
        self.declare(symbol, var, reg);
        Ok(())
    }

    /// Pushes a home slot for `symbol` holding `reg`, which carries `value`.
    fn declare(&mut self, symbol: SymbolId, value: VariableId, reg: usize) {
        self.release_dead();
        let var = self.new_variable(VariableKind::Named(symbol));
        let index = self.frame.scope.push(Entry::Named(var));
        self.var_mut(var).slot = Some(index);
        let slot = self.slot_of(var, index);
        self.backend
            .declare(&mut self.out, &slot, &self.backend.register(reg));
        self.frame.scope.bind(symbol, var);
        if self.var(value).is_temp() {
            self.transfer(value, var, reg);
        }
    }

    /// Stores `reg` (holding `value`) into the home slot of `symbol`.
    fn assign_to(&mut self, symbol: SymbolId, value: VariableId, reg: usize) -> CompileResult<()> {
        let target = self.resolve(symbol)?;
        if let Some(stale) = self.var(target).register
            && stale != reg
        {
            self.frame.registry.free(stale);
            self.var_mut(target).register = None;
        }
        let index = self.home_slot(target)?;
        let slot = self.slot_of(target, index);
        self.backend
            .store(&mut self.out, &slot, &self.backend.register(reg));
        if self.var(value).is_temp() {
            self.transfer(value, target, reg);
        }
        Ok(())
    }

    fn conditional(&mut self, id: NodeId) -> CompileResult<()> {
        let condition = self.child(id, 0, "condition")?;
        let then_body = self.child(id, 1, "body")?;
        let else_body = self.tree.child(id, 2);
        let branch = Branch {
            else_label: self.next_label("else"),
            end_label: self.next_label("endif"),
        };

        let var = self.expression(condition)?;
        let reg = self.ensure(var)?;
        self.release_dead();
        self.backend
            .if_begin(&mut self.out, &self.backend.register(reg), &branch);
        self.release_temp(var);
        self.flush();

        self.block(then_body)?;
        if let Some(else_body) = else_body {
            self.backend.if_else(&mut self.out, &branch);
            self.block(else_body)?;
        }
        self.backend
            .if_end(&mut self.out, &branch, else_body.is_some());
        self.flush();
        Ok(())
    }

    fn while_loop(&mut self, id: NodeId) -> CompileResult<()> {
        let condition = self.child(id, 0, "condition")?;
        let body = self.child(id, 1, "body")?;
        let labels = LoopLabels {
            top: self.next_label("loop"),
            exit: self.next_label("endloop"),
        };

        self.flush();
        self.backend.loop_begin(&mut self.out, &labels);
        let var = self.expression(condition)?;
        let reg = self.ensure(var)?;
        self.release_dead();
        self.backend
            .loop_test(&mut self.out, &self.backend.register(reg), &labels);
        self.release_temp(var);
        self.flush();

        self.block(body)?;
        self.backend.loop_end(&mut self.out, &labels);
        self.flush();
        Ok(())
    }

    fn counting_loop(&mut self, id: NodeId) -> CompileResult<()> {
        let counter_node = self.child(id, 0, "counter")?;
        let start = self.child(id, 1, "start")?;
        let end = self.child(id, 2, "end")?;
        let body = self.child(id, 3, "body")?;
        let symbol = self.symbol_of(counter_node)?;
        let labels = LoopLabels {
            top: self.next_label("for"),
            exit: self.next_label("endfor"),
        };

        let var = self.expression(start)?;
        let reg = self.ensure(var)?;
        if self.frame.scope.resolve(symbol).is_some() {
            self.assign_to(symbol, var, reg)?;
        } else {
            self.declare(symbol, var, reg);
        }
        self.release_temp(var);
        let counter = self.resolve(symbol)?;

        // The upper bound is evaluated once and kept in a hidden slot.
        self.frame.scope.enter();
        let var = self.expression(end)?;
        let reg = self.ensure(var)?;
        self.release_dead();
        let bound = self.new_variable(VariableKind::Hidden(self.hidden));
        self.hidden += 1;
        let index = self.frame.scope.push(Entry::Named(bound));
        self.var_mut(bound).slot = Some(index);
        let slot = self.slot_of(bound, index);
        self.backend
            .declare(&mut self.out, &slot, &self.backend.register(reg));
        if self.var(var).is_temp() {
            self.transfer(var, bound, reg);
        }

        self.flush();
        self.backend.loop_begin(&mut self.out, &labels);
        let bound_reg = self.ensure(bound)?;
        let counter_reg = self.ensure(counter)?;
        let (test, dest) = self.take_result(counter, counter_reg);
        let operands = Operands {
            lhs: ValueType::Integer,
            rhs: ValueType::Integer,
            result: ValueType::Boolean,
        };
        self.calculate(Construct::Le, dest, bound_reg, operands)?;
        self.release_dead();
        self.backend
            .loop_test(&mut self.out, &self.backend.register(dest), &labels);
        self.release_temp(test);
        self.flush();

        self.block(body)?;

        let counter_reg = self.ensure(counter)?;
        let (next, dest) = self.take_result(counter, counter_reg);
        let one = self.new_variable(VariableKind::Temp);
        let one_reg = self.allocate(one)?;
        self.backend.terminal(
            &mut self.out,
            &self.backend.register(one_reg),
            Literal::Integer("1"),
        );
        let operands = Operands {
            lhs: ValueType::Integer,
            rhs: ValueType::Integer,
            result: ValueType::Integer,
        };
        self.calculate(Construct::Add, dest, one_reg, operands)?;
        self.release_temp(one);
        self.assign_to(symbol, next, dest)?;
        self.flush();
        self.backend.loop_end(&mut self.out, &labels);

        self.leave_level();
        self.flush();
        Ok(())
    }

    /// Emits a nested block in its own lexical level.
    fn block(&mut self, id: NodeId) -> CompileResult<()> {
        self.frame.scope.enter();
        for statement in self.tree.children(id) {
            self.statement(statement)?;
        }
        self.leave_level();
        self.flush();
        Ok(())
    }

    fn leave_level(&mut self) {
        let (variables, released) = self.frame.scope.leave();
        for var in variables {
            if let Some(reg) = self.var(var).register {
                self.frame.registry.free(reg);
                self.var_mut(var).register = None;
            }
        }
        if released > 0 {
            self.backend.release(&mut self.out, released);
        }
    }

    fn call(&mut self, id: NodeId) -> CompileResult<()> {
        let symbol = self.symbol_of(id)?;
        let label = self.backend.function_label(self.symbols.name(symbol));

        let saved = if self.backend.clobbers_registers() {
            self.frame.registry.occupied()
        } else {
            Vec::new()
        };
        for (reg, _) in &saved {
            self.backend
                .push(&mut self.out, &self.backend.register(*reg), "save");
            self.frame.scope.push(Entry::Saved(*reg));
        }
        // Saved values come back through `relink`, so arguments may use
        // every register meanwhile.
        for (reg, var) in &saved {
            self.frame.registry.free(*reg);
            self.var_mut(*var).register = None;
        }

        let args = self.tree.children(id).collect::<Vec<_>>();
        for (index, arg) in args.iter().enumerate() {
            let var = self.expression(*arg)?;
            let reg = self.ensure(var)?;
            self.release_dead();
            self.backend
                .argument(&mut self.out, index, &self.backend.register(reg));
            self.frame.scope.push(Entry::Argument);
            self.release_temp(var);
        }

        self.backend.call(&mut self.out, &label, args.len());
        for _ in 0..args.len() {
            self.frame.scope.pop();
        }
        if !args.is_empty() {
            self.backend.release(&mut self.out, args.len());
        }

        for (reg, var) in saved.into_iter().rev() {
            if self.frame.scope.pop() != Some(Entry::Saved(reg)) {
                return Err(CompileError::AllocatorInvariant {
                    message: "saved registers restored out of order",
                });
            }
            self.backend
                .pop(&mut self.out, &self.backend.register(reg), "restore");
            self.relink(reg, var);
        }
        Ok(())
    }

    /// Makes `reg` the cache of `var` again after a restore.
    fn relink(&mut self, reg: usize, var: VariableId) {
        if let Occupant::Holds(other) = self.frame.registry.occupant(reg)
            && other != var
        {
            self.var_mut(other).register = None;
        }
        if let Some(previous) = self.var(var).register
            && previous != reg
        {
            self.frame.registry.free(previous);
        }
        self.frame.registry.assign(reg, var);
        self.frame.registry.promote(reg);
        self.var_mut(var).register = Some(reg);
    }

    fn function(&mut self, symbol: SymbolId) -> CompileResult<()> {
        let Some(definition) = self.symbols.get(symbol).definition else {
            return Err(CompileError::AllocatorInvariant {
                message: "function emitted without a stashed definition",
            });
        };
        let children = self.tree.children(definition).collect::<Vec<_>>();
        let Some((&body, rest)) = children.split_last() else {
            return Err(CompileError::MissingOperand {
                construct: Construct::FuncDef.name(),
                part: "body",
            });
        };
        let params = rest.get(1..).unwrap_or_default();
        let label = self.backend.function_label(self.symbols.name(symbol));

        let main = std::mem::replace(&mut self.frame, Frame::new(self.capacity));
        let mut vars = Vec::with_capacity(params.len());
        for param in params {
            let param_symbol = self.symbol_of(*param)?;
            let var = self.new_variable(VariableKind::Named(param_symbol));
            let index = self.frame.scope.push(Entry::Named(var));
            self.var_mut(var).slot = Some(index);
            self.frame.scope.bind(param_symbol, var);
            vars.push((var, index));
        }
        self.frame.scope.push(Entry::Return);
        let slots = vars
            .iter()
            .map(|(var, index)| self.slot_of(*var, *index))
            .collect::<Vec<_>>();

        self.out.blank();
        self.backend.function_begin(&mut self.out, &label, &slots);
        for statement in self.tree.children(body) {
            self.statement(statement)?;
        }
        let locals = self.frame.scope.len() - params.len() - 1;
        if locals > 0 {
            self.backend.release(&mut self.out, locals);
        }
        self.backend.function_end(&mut self.out);
        self.frame = main;
        Ok(())
    }

    /// Evaluates an expression, returning the variable holding its value.
    fn expression(&mut self, id: NodeId) -> CompileResult<VariableId> {
        let tree = self.tree;
        let node = tree.get(id);
        let value = node.value.as_deref().unwrap_or_default();
        let var = match node.construct {
            Construct::Integer => self.literal(Literal::Integer(value))?,
            Construct::Boolean => self.literal(Literal::Boolean(value == "true"))?,
            Construct::String => {
                let temp = self.new_variable(VariableKind::Temp);
                let reg = self.allocate(temp)?;
                let label = self.pool.label(value).unwrap_or_default();
                self.backend.terminal(
                    &mut self.out,
                    &self.backend.register(reg),
                    Literal::String(label),
                );
                temp
            }
            Construct::Variable => {
                let symbol = self.symbol_of(id)?;
                self.resolve(symbol)?
            }
            Construct::Not => {
                let operand = self.child(id, 0, "operand")?;
                let var = self.expression(operand)?;
                let reg = self.ensure(var)?;
                let (result, dest) = self.take_result(var, reg);
                let dest = self.backend.register(dest);
                self.backend.not(&mut self.out, &dest, &dest);
                result
            }
            op if op.is_operator() => {
                let left = self.child(id, 0, "left operand")?;
                let right = self.child(id, 1, "right operand")?;
                let lhs = self.expression(left)?;
                let rhs = self.expression(right)?;
                // The right operand is promoted first so loading the left
                // one never evicts it.
                let rhs_reg = self.ensure(rhs)?;
                let lhs_reg = self.ensure(lhs)?;
                let (result, dest) = self.take_result(lhs, lhs_reg);
                let operands = Operands {
                    lhs: self.type_of(left),
                    rhs: self.type_of(right),
                    result: self.type_of(id),
                };
                self.calculate(op, dest, rhs_reg, operands)?;
                if rhs != lhs {
                    self.release_temp(rhs);
                }
                result
            }
            _ => {
                return Err(CompileError::AllocatorInvariant {
                    message: "statement in expression position",
                });
            }
        };

        if node.negated {
            let reg = self.ensure(var)?;
            let (result, dest) = self.take_result(var, reg);
            let dest = self.backend.register(dest);
            self.backend.negate(&mut self.out, &dest, &dest);
            return Ok(result);
        }
        Ok(var)
    }

    fn literal(&mut self, literal: Literal<'_>) -> CompileResult<VariableId> {
        let temp = self.new_variable(VariableKind::Temp);
        let reg = self.allocate(temp)?;
        self.backend
            .terminal(&mut self.out, &self.backend.register(reg), literal);
        Ok(temp)
    }

    /// `dest = dest op rhs`.
    fn calculate(
        &mut self,
        op: Construct,
        dest: usize,
        rhs: usize,
        operands: Operands,
    ) -> CompileResult<()> {
        let arithmetic = matches!(
            op,
            Construct::Add | Construct::Sub | Construct::Mul | Construct::Div
        );
        let concatenation = op == Construct::Add && operands.result == ValueType::String;
        if arithmetic && !concatenation && operands.result != ValueType::Integer {
            return Err(CompileError::Unsupported {
                target: self.backend.name(),
                feature: "arithmetic on boolean or string operands",
            });
        }
        let dest = self.backend.register(dest);
        let rhs = self.backend.register(rhs);
        self.backend
            .calculation(&mut self.out, op, &dest, &dest, &rhs, operands)
    }

    /// Returns a temporary that owns `reg`, which currently holds `var`. A
    /// named variable only loses its cached copy; its slot stays valid.
    fn take_result(&mut self, var: VariableId, reg: usize) -> (VariableId, usize) {
        if self.var(var).is_temp() {
            return (var, reg);
        }
        self.var_mut(var).register = None;
        let temp = self.new_variable(VariableKind::Temp);
        self.frame.registry.assign(reg, temp);
        self.var_mut(temp).register = Some(reg);
        (temp, reg)
    }

    /// Hands the register of temporary `from` over to `to` as its cache.
    fn transfer(&mut self, from: VariableId, to: VariableId, reg: usize) {
        self.var_mut(from).register = None;
        if let Some(previous) = self.var(to).register
            && previous != reg
        {
            self.frame.registry.free(previous);
        }
        self.frame.registry.assign(reg, to);
        self.var_mut(to).register = Some(reg);
    }

    /// Loads `var` into a register if needed and marks it most recently used.
    fn ensure(&mut self, var: VariableId) -> CompileResult<usize> {
        if let Some(reg) = self.var(var).register {
            self.frame.registry.promote(reg);
            return Ok(reg);
        }
        let index = self.home_slot(var)?;
        let reg = self.allocate(var)?;
        let slot = self.slot_of(var, index);
        self.backend
            .load(&mut self.out, &self.backend.register(reg), &slot);
        if self.var(var).is_temp() {
            trace!(reg, var = var.0, "reloading spilled temporary");
            self.frame.scope.mark_dead(index);
            self.var_mut(var).slot = None;
        }
        Ok(reg)
    }

    /// Claims a register for `var`, spilling whatever temporary held it.
    fn allocate(&mut self, var: VariableId) -> CompileResult<usize> {
        let (reg, previous) = self.frame.registry.allocate();
        if let Occupant::Holds(victim) = previous {
            self.var_mut(victim).register = None;
            if self.var(victim).is_temp() {
                trace!(reg, victim = victim.0, "spilling temporary");
                self.backend
                    .push(&mut self.out, &self.backend.register(reg), "spill");
                let index = self.frame.scope.push(Entry::Spilled(victim));
                self.var_mut(victim).slot = Some(index);
            }
        }
        self.frame.registry.assign(reg, var);
        self.var_mut(var).register = Some(reg);
        Ok(reg)
    }

    fn release_temp(&mut self, var: VariableId) {
        if !self.var(var).is_temp() {
            return;
        }
        if let Some(reg) = self.var(var).register {
            self.frame.registry.free(reg);
            self.var_mut(var).register = None;
        }
    }

    fn release_dead(&mut self) {
        let released = self.frame.scope.release_dead();
        if released > 0 {
            self.backend.release(&mut self.out, released);
        }
    }

    /// Forgets cached copies of named variables at control-flow boundaries.
    fn flush(&mut self) {
        for (reg, var) in self.frame.registry.occupied() {
            if !self.var(var).is_temp() {
                self.frame.registry.free(reg);
                self.var_mut(var).register = None;
            }
        }
    }

    fn end_statement(&mut self) {
        for (reg, var) in self.frame.registry.occupied() {
            if self.var(var).is_temp() {
                self.frame.registry.free(reg);
                self.var_mut(var).register = None;
            }
        }
        self.release_dead();
    }

    fn new_variable(&mut self, kind: VariableKind) -> VariableId {
        let id = VariableId(self.frame.variables.len());
        self.frame.variables.push(Variable::new(kind));
        id
    }

    fn var(&self, id: VariableId) -> &Variable {
        &self.frame.variables[id.0]
    }

    fn var_mut(&mut self, id: VariableId) -> &mut Variable {
        &mut self.frame.variables[id.0]
    }

    fn home_slot(&self, var: VariableId) -> CompileResult<usize> {
        self.var(var).slot.ok_or_else(|| CompileError::UnresolvedVariable {
            name: self.describe(var),
        })
    }

    fn slot_of(&self, var: VariableId, index: usize) -> Slot {
        let name = match self.var(var).kind {
            VariableKind::Named(symbol) => SlotName::Variable(self.symbols.name(symbol).to_string()),
            VariableKind::Hidden(n) => SlotName::Hidden(n),
            VariableKind::Temp => SlotName::Spill,
        };
        Slot {
            offset: self.frame.scope.offset(index),
            position: index,
            name,
        }
    }

    fn describe(&self, var: VariableId) -> String {
        match self.var(var).kind {
            VariableKind::Named(symbol) => self.symbols.name(symbol).to_string(),
            VariableKind::Hidden(n) => format!("<bound {n}>"),
            VariableKind::Temp => format!("<temp {}>", var.0),
        }
    }

    fn resolve(&self, symbol: SymbolId) -> CompileResult<VariableId> {
        self.frame
            .scope
            .resolve(symbol)
            .ok_or_else(|| CompileError::UnresolvedVariable {
                name: self.symbols.name(symbol).to_string(),
            })
    }

    fn symbol_of(&self, id: NodeId) -> CompileResult<SymbolId> {
        self.tree
            .get(id)
            .symbol
            .ok_or(CompileError::AllocatorInvariant {
                message: "named node without a symbol",
            })
    }

    fn child(&self, id: NodeId, index: usize, part: &'static str) -> CompileResult<NodeId> {
        self.tree
            .child(id, index)
            .ok_or_else(|| CompileError::MissingOperand {
                construct: self.tree.get(id).construct.name(),
                part,
            })
    }

    /// Static type of an expression node, integer when nothing pinned it.
    fn type_of(&self, id: NodeId) -> ValueType {
        let node = self.tree.get(id);
        node.ty
            .or_else(|| node.symbol.and_then(|symbol| self.symbols.get(symbol).ty))
            .unwrap_or(ValueType::Integer)
    }

    fn next_label(&mut self, stem: &str) -> String {
        let label = format!("{stem}_{}", self.labels);
        self.labels += 1;
        label
    }
}

/// Generates target code for a typed AST.
pub fn generate(
    backend: &dyn Backend,
    tree: &Tree,
    symbols: &mut SymbolTable,
    registers: Option<usize>,
) -> CompileResult<String> {
    Generator::new(backend, tree, symbols, registers)?.assemble()
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use crate::error::CompileError;
    use crate::vm::Vm;
    use crate::{CompileOptions, Target, compile};

    fn asm(source: &str, registers: Option<usize>) -> Result<String, CompileError> {
        let options = CompileOptions {
            target: Target::Asm,
            registers,
        };
        compile(source, &options)
    }

    fn run(code: &str) -> String {
        Vm::load(code).unwrap().run("").unwrap()
    }

    /// Instruction text of every line whose comment is `comment`.
    fn commented<'c>(code: &'c str, comment: &str) -> Vec<&'c str> {
        code.lines()
            .filter_map(|line| line.split_once(';'))
            .filter(|(_, note)| note.trim() == comment)
            .map(|(instruction, _)| instruction.trim())
            .collect()
    }

    #[test]
    fn spilled_temporaries_round_trip() {
        let source = "echo 1 + (2 + (3 + 4));";
        let roomy = asm(source, None).unwrap();
        assert!(commented(&roomy, "spill").is_empty());

        let tight = asm(source, Some(2)).unwrap();
        assert_eq!(commented(&tight, "spill"), vec!["push r0", "push r1"]);
        assert_eq!(
            commented(&tight, "spilled temp"),
            vec!["load r1, [sp+0]", "load r0, [sp+1]"]
        );
        assert!(tight.contains("drop 2"));
        assert_eq!(run(&tight), "10");
    }

    #[test]
    fn calls_save_and_restore_in_reverse_order() {
        let code = asm(
            indoc! {"
                var x = 1;
                var y = 2;
                function f(a) { echo a; }
                f(x + y);
                echo x;
            "},
            None,
        )
        .unwrap();
        assert_eq!(commented(&code, "save"), vec!["push r0", "push r1"]);
        assert_eq!(commented(&code, "restore"), vec!["pop r1", "pop r0"]);
        assert_eq!(run(&code), "3\n1");
    }

    #[test]
    fn nested_blocks_release_their_slots() {
        let code = asm(
            indoc! {r#"
                var total = 0;
                for (i = 1 to 4) {
                    var square = i * i;
                    total = total + square;
                }
                if (total > 20) { var msg = "big "; echo msg + total; } else { echo total; }
                echo i;
            "#},
            Some(3),
        )
        .unwrap();
        assert_eq!(run(&code), "big 30\n5");
    }

    #[test]
    fn function_bodies_cannot_see_globals() {
        let error = asm("var g = 1;\nfunction f() { echo g; }\nf();\n", None).unwrap_err();
        assert_eq!(
            error,
            CompileError::UnresolvedVariable {
                name: "g".to_string()
            }
        );
    }

    #[test]
    fn arithmetic_needs_integers_or_concatenation() {
        for source in ["echo true * false;", "echo true + true;", "echo \"a\" - \"b\";"] {
            let error = asm(source, None).unwrap_err();
            assert!(
                matches!(error, CompileError::Unsupported { target: "asm", .. }),
                "{source}: {error}"
            );
        }
        assert_eq!(run(&asm("echo \"a\" + \"b\";", None).unwrap()), "ab");
    }

    #[test]
    fn needs_two_registers() {
        let error = asm("echo 1;", Some(1)).unwrap_err();
        assert!(matches!(error, CompileError::AllocatorInvariant { .. }));
    }
}
