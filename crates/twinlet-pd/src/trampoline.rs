//! Raw entry points Pd calls.
//!
//! Numbered slots are materialized as monomorphized functions, one per
//! (kind, slot), up to [`MAX_SLOTS`]. Every entry point catches panics so
//! none unwinds into Pd.

use std::panic::{catch_unwind, AssertUnwindSafe};

use twinlet_core::{Message, MessageKind, PerformArgs, PerformWord, SampleFormat};

use crate::api::PdMethod;
use crate::handle::symbol_from_raw;
use crate::object::PdObject;
use crate::sys::{
    t_floatarg, t_int, t_object, t_sample, t_signal, t_symbol, BangMethod, FloatMethod,
    SymbolMethod,
};

/// Highest numbered slot with an entry point.
pub const MAX_SLOTS: usize = 16;

unsafe fn dispatch(object: *mut t_object, kind: MessageKind, slot: usize, message: Message) {
    let _ = catch_unwind(AssertUnwindSafe(|| unsafe {
        PdObject::enter(object, |instance| {
            let _ = instance.dispatch_slot(kind, slot, message);
        });
    }));
}

unsafe extern "C" fn bang_slot<const K: usize>(object: *mut t_object) {
    dispatch(object, MessageKind::Bang, K, Message::Bang);
}

unsafe extern "C" fn float_slot<const K: usize>(object: *mut t_object, value: t_floatarg) {
    dispatch(object, MessageKind::Float, K, Message::Float(value as f64));
}

unsafe extern "C" fn symbol_slot<const K: usize>(object: *mut t_object, symbol: *mut t_symbol) {
    if let Some(symbol) = symbol_from_raw(symbol) {
        dispatch(object, MessageKind::Symbol, K, Message::Symbol(symbol));
    }
}

macro_rules! slot_table {
    ($f:ident as $ty:ty; $($k:literal)*) => {
        [$($f::<$k> as $ty),*]
    };
}

static BANG_SLOTS: [BangMethod; MAX_SLOTS] =
    slot_table!(bang_slot as BangMethod; 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16);
static FLOAT_SLOTS: [FloatMethod; MAX_SLOTS] =
    slot_table!(float_slot as FloatMethod; 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16);
static SYMBOL_SLOTS: [SymbolMethod; MAX_SLOTS] =
    slot_table!(symbol_slot as SymbolMethod; 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16);

/// Entry point for numbered slot `slot` (1-based) of `kind`.
pub(crate) fn slot_method(kind: MessageKind, slot: usize) -> Option<PdMethod> {
    let index = slot.checked_sub(1)?;
    match kind {
        MessageKind::Bang => BANG_SLOTS.get(index).copied().map(PdMethod::Bang),
        MessageKind::Float => FLOAT_SLOTS.get(index).copied().map(PdMethod::Float),
        MessageKind::Symbol => SYMBOL_SLOTS.get(index).copied().map(PdMethod::Symbol),
        _ => None,
    }
}

/// `dsp` method: add this object's perform routine to the chain.
///
/// Signals arrive inputs first, then outputs, all of one block size.
pub(crate) unsafe extern "C" fn dsp(object: *mut t_object, signals: *mut *mut t_signal) {
    let _ = catch_unwind(AssertUnwindSafe(|| unsafe {
        let packed = PdObject::enter(object, |instance| {
            let ins = instance.ports().in_channel_count();
            let outs = instance.ports().out_channel_count();
            if ins + outs == 0 || signals.is_null() {
                return None;
            }

            let signals = std::slice::from_raw_parts(signals, ins + outs);
            let block_size = (*signals[0]).s_n.max(0) as usize;
            let inputs: Vec<*const t_sample> = signals[..ins]
                .iter()
                .map(|s| (**s).s_vec as *const t_sample)
                .collect();
            let outputs: Vec<*mut t_sample> =
                signals[ins..].iter().map(|s| (**s).s_vec).collect();

            instance.prepare_signal(SampleFormat::Float32, block_size);
            Some(PerformArgs::pack(
                object as PerformWord,
                &inputs,
                &outputs,
                block_size,
            ))
        });
        let Some(Some(args)) = packed else {
            return;
        };

        let record = PdObject::from_raw(object);
        record.perform_len = args.len();
        let mut words: Vec<t_int> = args.as_slice().iter().map(|w| *w as t_int).collect();
        if let Some(class) = record.class() {
            class.api.dsp_add(perform, &mut words);
        }
    }));
}

/// Perform routine: `w[1]` is the object, `w[2..]` the buffers and block size.
pub(crate) unsafe extern "C" fn perform(w: *mut t_int) -> *mut t_int {
    let object = *w.add(1) as *mut t_object;
    let len = PdObject::perform_len(object);
    let _ = catch_unwind(AssertUnwindSafe(|| unsafe {
        PdObject::enter(object, |instance| {
            let words =
                std::slice::from_raw_parts(w.add(2) as *const PerformWord, len.saturating_sub(1));
            instance.render_packed_f32(words);
        });
    }));
    w.add(len + 1)
}
