//! Class linking: field layout, argument sizes and dispatch tables.

use crate::class::{Class, Linkage};
use core_types::{Value, VmError};
use std::sync::Arc;

const FINALIZE: &str = "finalize";
const FINALIZE_DESCRIPTOR: &str = "()V";

/// Links `class`, its superclass chain and its superinterfaces.
///
/// Idempotent. Concurrent callers serialize on the class's link lock; only
/// one of them computes the layout.
pub fn link(class: &Class) -> Result<&Linkage, VmError> {
    if let Some(linkage) = class.linkage.get() {
        return Ok(linkage);
    }
    if let Some(super_class) = class.super_class() {
        link(super_class)?;
    }
    for interface in class.interfaces() {
        link(interface)?;
    }

    let _guard = class.link_lock.lock();
    if let Some(linkage) = class.linkage.get() {
        return Ok(linkage);
    }
    let linkage = compute(class)?;
    log::debug!(
        "linked {}: {} instance slots, {} virtual methods{}",
        class.name(),
        linkage.instance_size,
        linkage.vtable.len(),
        if linkage.finalizer.is_some() { ", finalizable" } else { "" }
    );
    Ok(class.linkage.get_or_init(|| linkage))
}

fn compute(class: &Class) -> Result<Linkage, VmError> {
    let parent = match class.super_class() {
        Some(super_class) => Some(super_class.linkage().ok_or_else(|| {
            VmError::internal(format!("superclass of {} is not linked", class.name()))
        })?),
        None => None,
    };
    let interface = class.is_interface();

    let (mut instance_size, mut template) = match parent {
        Some(parent) if !interface => (parent.instance_size, parent.template.clone()),
        _ => (0, Vec::new()),
    };
    for field in class.fields() {
        if field.is_static() {
            field.reset_static();
            continue;
        }
        field.set_offset(instance_size);
        template.push(Value::zero_for(field.descriptor()));
        instance_size += 1;
        if field.is_wide() {
            template.push(Value::Top);
            instance_size += 1;
        }
    }

    for method in class.methods() {
        let args = method.signature().arg_slots() + usize::from(!method.is_static());
        method.set_args_count(args);
        if method.is_native() {
            method.set_max_locals(args);
        }
    }

    let mut vtable = match parent {
        Some(parent) if !interface => parent.vtable.clone(),
        _ => Vec::new(),
    };
    if !interface {
        for method in class.methods() {
            if method.is_static() || method.is_private() || method.is_initializer() {
                continue;
            }
            let inherited = vtable
                .iter()
                .position(|m| m.name() == method.name() && m.descriptor() == method.descriptor());
            let index = match inherited {
                Some(index) => {
                    vtable[index] = Arc::clone(method);
                    index
                }
                None => {
                    vtable.push(Arc::clone(method));
                    vtable.len() - 1
                }
            };
            method.set_vtable_index(index);
        }
    }

    let finalizer = vtable
        .iter()
        .find(|m| {
            m.name() == FINALIZE
                && m.descriptor() == FINALIZE_DESCRIPTOR
                && m.class().is_some_and(|owner| owner.super_class().is_some())
        })
        .cloned();

    Ok(Linkage {
        instance_size,
        template,
        vtable,
        finalizer,
    })
}
