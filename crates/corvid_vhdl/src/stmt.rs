//! Rendering of statement blocks.

use crate::expr::Renderer;
use crate::types::{convert, literal, string_literal, Expr};
use crate::writer::Writer;
use corvid_diagnostics::{CompileError, CompileResult};
use corvid_ir::{BlockId, Stmt, StmtKind};
use corvid_types::{ConstValue, InlinePart, ObjectId, Operand, Primitive, QualifierKind};
use itertools::Itertools;

/// Writes the statements of one context.
pub(crate) struct Body<'r, 'a> {
    pub r: &'r Renderer<'a>,
    /// Inside a process rather than in the concurrent region.
    pub sequential: bool,
}

impl Body<'_, '_> {
    pub fn block(&self, w: &mut Writer, block: BlockId) -> CompileResult<()> {
        for stmt in &self.r.code.get(block).stmts {
            self.stmt(w, stmt)?;
        }
        Ok(())
    }

    fn assign_op(&self, target: ObjectId) -> &'static str {
        let local = matches!(
            self.r.objects.kind(target),
            QualifierKind::Variable | QualifierKind::Temporary
        );
        if self.sequential && local {
            ":="
        } else {
            "<="
        }
    }

    fn assign(&self, w: &mut Writer, target: ObjectId, value: Expr) -> CompileResult<()> {
        let place = self.r.place(target)?;
        let value = convert(value, &place.ty)?;
        w.line(format!("{} {} {};", place.text, self.assign_op(target), value.text));
        Ok(())
    }

    fn stmt(&self, w: &mut Writer, stmt: &Stmt) -> CompileResult<()> {
        let r = self.r;
        match &stmt.kind {
            StmtKind::Nop => {}
            StmtKind::Comment(lines) => {
                for line in lines {
                    w.line(format!("-- {line}"));
                }
            }
            StmtKind::SignalAssignment { target, source }
            | StmtKind::SignalPush { target, source }
            | StmtKind::VariableAssignment { target, source } => {
                if !r.is_inlined(*target) {
                    let value = r.operand_as(source, r.objects.ty(*target))?;
                    self.assign(w, *target, value)?;
                }
            }
            kind if kind.is_expression() => {
                let written = kind.written();
                let [result] = written.as_slice() else {
                    return Err(CompileError::sanity("expression without a single result"));
                };
                if !r.is_inlined(*result) {
                    self.assign(w, *result, r.expression(kind)?)?;
                }
            }
            StmtKind::If { test, body, orelse } => self.if_chain(w, test, *body, *orelse)?,
            StmtKind::CaseWhen {
                value,
                branches,
                default,
            } => self.case(w, value, branches, *default)?,
            StmtKind::SelectWith {
                target,
                arg,
                choices,
                default,
            } => {
                if self.sequential {
                    self.select_as_case(w, *target, arg, choices, default.as_ref())?;
                } else {
                    self.select(w, *target, arg, choices, default.as_ref())?;
                }
            }
            StmtKind::Assert { test, message } => {
                let cond = convert(r.operand(test)?, &Primitive::Bool)?;
                match message {
                    Some(text) => w.line(format!("assert {} report {};", cond.text, string_literal(text))),
                    None => w.line(format!("assert {};", cond.text)),
                }
            }
            StmtKind::InlineCode { parts } => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        InlinePart::Text(t) => text.push_str(t),
                        InlinePart::Read(id) => text.push_str(&r.read(*id)?.text),
                        InlinePart::Target(id) => text.push_str(&r.place(*id)?.text),
                    }
                }
                for line in text.lines() {
                    w.line(line.trim_end());
                }
            }
            other => {
                return Err(CompileError::sanity(format!(
                    "interior statement reached the VHDL assembler: {other:?}"
                )))
            }
        }
        Ok(())
    }

    fn if_chain(&self, w: &mut Writer, test: &Operand, body: BlockId, orelse: BlockId) -> CompileResult<()> {
        let cond = convert(self.r.operand(test)?, &Primitive::Bool)?;
        w.line(format!("if {} then", cond.text));
        self.nested(w, body)?;
        let mut orelse = orelse;
        loop {
            let stmts = &self.r.code.get(orelse).stmts;
            if let [Stmt {
                kind: StmtKind::If { test, body, orelse: next },
                ..
            }] = stmts.as_slice()
            {
                let cond = convert(self.r.operand(test)?, &Primitive::Bool)?;
                w.line(format!("elsif {} then", cond.text));
                self.nested(w, *body)?;
                orelse = *next;
                continue;
            }
            if !stmts.is_empty() {
                w.line("else");
                self.nested(w, orelse)?;
            }
            break;
        }
        w.line("end if;");
        Ok(())
    }

    fn nested(&self, w: &mut Writer, block: BlockId) -> CompileResult<()> {
        w.indent();
        let result = self.block(w, block);
        w.dedent();
        result
    }

    fn choice(&self, value: &ConstValue, selector: &Expr) -> CompileResult<String> {
        Ok(literal(value, &selector.ty, self.r.types())?.text)
    }

    /// Whether `choices` name every value of the selector type.
    fn covers(&self, selector: &Expr, choices: &[&ConstValue]) -> bool {
        let distinct = choices.iter().unique().count();
        match &selector.ty {
            Primitive::Enum(id) => self
                .r
                .types()
                .enum_members(*id)
                .is_ok_and(|members| distinct == members.len()),
            Primitive::Bool => distinct == 2,
            _ => false,
        }
    }

    fn case(
        &self,
        w: &mut Writer,
        value: &Operand,
        branches: &[(ConstValue, BlockId)],
        default: Option<BlockId>,
    ) -> CompileResult<()> {
        let selector = self.r.selector(value)?;
        w.line(format!("case {} is", selector.text));
        w.indent();
        for (choice, block) in branches {
            w.line(format!("when {} =>", self.choice(choice, &selector)?));
            self.nested(w, *block)?;
        }
        let values: Vec<&ConstValue> = branches.iter().map(|(c, _)| c).collect();
        match default {
            Some(block) => {
                w.line("when others =>");
                self.nested(w, block)?;
            }
            None if !self.covers(&selector, &values) => {
                w.line("when others =>");
                w.indent();
                w.line("null;");
                w.dedent();
            }
            None => {}
        }
        w.dedent();
        w.line("end case;");
        Ok(())
    }

    fn select(
        &self,
        w: &mut Writer,
        target: ObjectId,
        arg: &Operand,
        choices: &[(ConstValue, Operand)],
        default: Option<&Operand>,
    ) -> CompileResult<()> {
        let place = self.r.place(target)?;
        let selector = self.r.selector(arg)?;
        w.line(format!("with {} select {} <=", selector.text, place.text));
        w.indent();
        for (choice, value) in choices {
            let value = self.r.operand_as(value, &place.ty)?;
            w.line(format!("{} when {},", value.text, self.choice(choice, &selector)?));
        }
        let other = match default {
            Some(value) => self.r.operand_as(value, &place.ty)?.text,
            None => "unaffected".to_string(),
        };
        w.line(format!("{other} when others;"));
        w.dedent();
        Ok(())
    }

    fn select_as_case(
        &self,
        w: &mut Writer,
        target: ObjectId,
        arg: &Operand,
        choices: &[(ConstValue, Operand)],
        default: Option<&Operand>,
    ) -> CompileResult<()> {
        let selector = self.r.selector(arg)?;
        let ty = self.r.objects.ty(target).clone();
        w.line(format!("case {} is", selector.text));
        w.indent();
        for (choice, value) in choices {
            w.line(format!("when {} =>", self.choice(choice, &selector)?));
            w.indent();
            self.assign(w, target, self.r.operand_as(value, &ty)?)?;
            w.dedent();
        }
        w.line("when others =>");
        w.indent();
        match default {
            Some(value) => self.assign(w, target, self.r.operand_as(value, &ty)?)?,
            None => w.line("null;"),
        }
        w.dedent();
        w.dedent();
        w.line("end case;");
        Ok(())
    }
}
