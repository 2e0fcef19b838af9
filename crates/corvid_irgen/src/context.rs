//! Generation of one context.

use crate::gen::IrGen;
use crate::liveness::check_liveness;
use crate::remap::ObjectMap;
use crate::reset::expand_resets;
use crate::statemachine::{lift_aliases, localize_temporaries, Machine};
use crate::GenCx;
use corvid_diagnostics::{CompileError, CompileResult};
use corvid_frontend::{PreparedContext, PreparedTree};
use corvid_ir::{BlockId, Concurrent, Context, Sequential};
use corvid_types::{ContextKind, QualifierKind};

/// Lowers a prepared context into an IR context.
pub(crate) fn generate_context(cx: &mut GenCx, tree: &PreparedTree, ctx: &PreparedContext) -> CompileResult<Context> {
    log::debug!("generating {} context `{}`", ctx.kind.as_str(), ctx.name);
    let context = match ctx.kind {
        ContextKind::Concurrent => {
            let root = cx.code.alloc(None, None);
            IrGen::new(cx, tree, ContextKind::Concurrent).lower(ctx.root, vec![root])?;
            Context::Concurrent(Concurrent {
                name: ctx.name.clone(),
                code: root,
                attributes: ctx.attributes.clone(),
                loc: ctx.loc,
                frame: ctx.frame,
            })
        }
        ContextKind::Sequential => generate_sequential(cx, tree, ctx)?,
    };
    ensure_final(cx, &context)?;
    Ok(context)
}

fn generate_sequential(cx: &mut GenCx, tree: &PreparedTree, ctx: &PreparedContext) -> CompileResult<Context> {
    let machine = Machine::new(&mut cx.code);
    let entry = machine.first_block();
    let mut gen = IrGen::new(cx, tree, ContextKind::Sequential).with_machine(machine);
    gen.lower(ctx.root, vec![entry])?;
    let machine = gen
        .into_machine()
        .ok_or_else(|| CompileError::sanity("state machine lost during generation"))?;

    let always = if ctx.always.is_empty() {
        None
    } else {
        let root = cx.code.alloc(None, None);
        let mut gen = IrGen::new(cx, tree, ContextKind::Concurrent);
        let mut opens = vec![root];
        for &node in &ctx.always {
            opens = gen.lower(node, opens)?;
        }
        promote_companion_results(cx, root);
        Some(Concurrent {
            name: format!("{}_always", ctx.name),
            code: root,
            attributes: Default::default(),
            loc: ctx.loc,
            frame: ctx.frame,
        })
    };

    for &state in machine.states() {
        lift_aliases(cx, state, ObjectMap::new())?;
    }
    let copies = localize_temporaries(cx, machine.states())?;
    for &state in machine.states() {
        check_liveness(cx, state, &copies)?;
    }
    if machine.states().len() > 1 {
        log::debug!("`{}` suspends in {} states", ctx.name, machine.states().len());
    }
    let (root, register) = machine.finish(cx, &ctx.name)?;
    expand_resets(cx, root, register)?;

    Ok(Context::Sequential(Sequential {
        name: ctx.name.clone(),
        code: root,
        always,
        sensitivity: ctx.sensitivity.clone(),
        state: register,
        attributes: ctx.attributes.clone(),
        loc: ctx.loc,
        frame: ctx.frame,
    }))
}

/// Results computed by an always-block are read by its process in other
/// activations, so they become signals.
fn promote_companion_results(cx: &mut GenCx, root: BlockId) {
    let mut written = Vec::new();
    cx.code.walk(root, &mut |_, stmt| {
        for id in stmt.kind.written() {
            let root = cx.objects.root(id);
            if cx.objects.kind(root) == QualifierKind::Temporary {
                written.push(root);
            }
        }
    });
    for id in written {
        cx.objects.promote_to_signal(id);
    }
}

fn ensure_final(cx: &GenCx, context: &Context) -> CompileResult<()> {
    let mut roots = vec![context.code()];
    if let Context::Sequential(Sequential {
        always: Some(always),
        ..
    }) = context
    {
        roots.push(always.code);
    }
    let mut leftover = None;
    for root in roots {
        cx.code.walk(root, &mut |_, stmt| {
            if stmt.kind.is_interior() && leftover.is_none() {
                leftover = Some(format!("{:?}", stmt.kind));
            }
        });
    }
    match leftover {
        Some(kind) => Err(CompileError::sanity(format!(
            "interior statement survived generation of `{}`: {kind}",
            context.name()
        ))),
        None => Ok(()),
    }
}
