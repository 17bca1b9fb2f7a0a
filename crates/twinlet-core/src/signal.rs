//! Audio Vector Builder.
//!
//! Each render block the host hands over raw buffer pointers: signal inlets
//! first, in declaration order, then signal outlets, then the block size.
//! Hosts with a flat argument list (Pd's `dsp_addv`) receive them packed as
//! [`PerformArgs`]; hosts with pointer arrays (Max's `perform64`) pass the
//! arrays directly. Either way [`SignalStorage`] turns them into a
//! [`Buffer`] and runs the external's `process`.
//!
//! # Real-Time Safety
//!
//! - Pointer and scratch storage is allocated in [`SignalStorage::allocate`]
//!   from the DSP setup call, never during a block.
//! - `clear()` only resets lengths.
//! - A block larger than the reported maximum grows the scratch once and
//!   logs a warning.

use std::mem;
use std::slice;

use crate::buffer::Buffer;
use crate::sample::Sample;
use crate::types::MAX_CHANNELS;

/// One machine word of a packed perform argument list.
pub type PerformWord = usize;

/// Length of a packed argument list: object, inputs, outputs, block size.
pub const fn perform_arg_count(in_channels: usize, out_channels: usize) -> usize {
    in_channels + out_channels + 2
}

/// Flat perform argument list `[object, in.., out.., n]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformArgs {
    words: Vec<PerformWord>,
}

impl PerformArgs {
    /// Pack the object pointer, buffer pointers and block size.
    pub fn pack<S>(
        object: PerformWord,
        inputs: &[*const S],
        outputs: &[*mut S],
        block_size: usize,
    ) -> Self {
        let mut words = Vec::with_capacity(perform_arg_count(inputs.len(), outputs.len()));
        words.push(object);
        words.extend(inputs.iter().map(|p| *p as PerformWord));
        words.extend(outputs.iter().map(|p| *p as PerformWord));
        words.push(block_size);
        Self { words }
    }

    pub fn object(&self) -> PerformWord {
        self.words[0]
    }

    /// Everything after the object word.
    pub fn buffers(&self) -> &[PerformWord] {
        &self.words[1..]
    }

    pub fn as_slice(&self) -> &[PerformWord] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Pre-allocated pointer and scratch storage for one sample type.
pub struct SignalStorage<S: Sample> {
    inputs: Vec<*const S>,
    outputs: Vec<*mut S>,
    /// Copies of inputs that share memory with an output.
    input_scratch: Vec<Vec<S>>,
    /// Render targets for outputs that share memory with an earlier output.
    output_scratch: Vec<Vec<S>>,
    in_channels: usize,
    out_channels: usize,
    max_block: usize,
}

impl<S: Sample> SignalStorage<S> {
    /// Allocate for a fixed channel layout and the host's maximum block size.
    pub fn allocate(in_channels: usize, out_channels: usize, max_block: usize) -> Self {
        let in_channels = in_channels.min(MAX_CHANNELS);
        let out_channels = out_channels.min(MAX_CHANNELS);
        Self {
            inputs: Vec::with_capacity(in_channels),
            outputs: Vec::with_capacity(out_channels),
            input_scratch: (0..in_channels).map(|_| vec![S::ZERO; max_block]).collect(),
            output_scratch: (0..out_channels).map(|_| vec![S::ZERO; max_block]).collect(),
            in_channels,
            out_channels,
            max_block,
        }
    }

    #[inline]
    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    #[inline]
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    #[inline]
    pub fn max_block(&self) -> usize {
        self.max_block
    }

    /// Forget the previous block's pointers.
    #[inline]
    pub fn clear(&mut self) {
        self.inputs.clear();
        self.outputs.clear();
    }

    /// Collect pointer arrays supplied by the host.
    ///
    /// Missing channels are filled with null, extra channels are ignored.
    pub fn collect(&mut self, inputs: &[*const S], outputs: &[*mut S]) {
        self.clear();
        for i in 0..self.in_channels {
            self.inputs.push(inputs.get(i).copied().unwrap_or(std::ptr::null()));
        }
        for i in 0..self.out_channels {
            self.outputs.push(outputs.get(i).copied().unwrap_or(std::ptr::null_mut()));
        }
    }

    /// Collect a packed `[in.., out.., n]` word list and return `n`.
    ///
    /// Returns 0 if the list is shorter than the channel layout requires.
    pub fn collect_packed(&mut self, words: &[PerformWord]) -> usize {
        self.clear();
        let needed = self.in_channels + self.out_channels + 1;
        if words.len() < needed {
            log::warn!(
                "Perform list has {} words, expected {}",
                words.len(),
                needed
            );
            return 0;
        }
        let (ins, rest) = words.split_at(self.in_channels);
        let (outs, rest) = rest.split_at(self.out_channels);
        self.inputs.extend(ins.iter().map(|w| *w as *const S));
        self.outputs.extend(outs.iter().map(|w| *w as *mut S));
        rest[0]
    }

    /// Build a [`Buffer`] over the collected pointers and run `f` on it.
    ///
    /// Inputs that overlap any output are copied to scratch first. Outputs
    /// that overlap an earlier output are rendered to scratch and copied
    /// back afterwards. Null pointers read as silence and discard writes.
    ///
    /// # Safety
    ///
    /// Every non-null collected pointer must be valid for `num_samples`
    /// reads (inputs) or writes (outputs) for the duration of the call.
    pub unsafe fn render<F>(&mut self, num_samples: usize, f: F)
    where
        F: FnOnce(&mut Buffer<'_, S>),
    {
        if num_samples > self.max_block {
            log::warn!(
                "Block of {} samples exceeds prepared maximum {}, growing scratch",
                num_samples,
                self.max_block
            );
            for scratch in self.input_scratch.iter_mut().chain(self.output_scratch.iter_mut()) {
                scratch.resize(num_samples, S::ZERO);
            }
            self.max_block = num_samples;
        }

        let n = num_samples;
        let Self {
            inputs,
            outputs,
            input_scratch,
            output_scratch,
            ..
        } = self;

        let mut input_in_scratch = [false; MAX_CHANNELS];
        for (i, &ptr) in inputs.iter().enumerate() {
            if ptr.is_null() {
                input_scratch[i][..n].fill(S::ZERO);
                input_in_scratch[i] = true;
            } else if outputs.iter().any(|&o| overlaps(ptr, o as *const S, n)) {
                input_scratch[i][..n].copy_from_slice(slice::from_raw_parts(ptr, n));
                input_in_scratch[i] = true;
            }
        }

        let mut output_in_scratch = [false; MAX_CHANNELS];
        for (j, &ptr) in outputs.iter().enumerate() {
            output_in_scratch[j] = ptr.is_null()
                || outputs[..j]
                    .iter()
                    .any(|&o| overlaps(ptr as *const S, o as *const S, n));
        }

        {
            let input_slices = inputs.iter().enumerate().map(|(i, &ptr)| {
                if input_in_scratch[i] || n == 0 {
                    &input_scratch[i][..n]
                } else {
                    slice::from_raw_parts(ptr, n)
                }
            });
            let output_slices =
                outputs
                    .iter()
                    .zip(output_scratch.iter_mut())
                    .enumerate()
                    .map(|(j, (&ptr, scratch))| {
                        if output_in_scratch[j] || n == 0 {
                            &mut scratch[..n]
                        } else {
                            slice::from_raw_parts_mut(ptr, n)
                        }
                    });
            let mut buffer = Buffer::new(input_slices, output_slices, n);
            f(&mut buffer);
        }

        for (j, &ptr) in outputs.iter().enumerate() {
            if output_in_scratch[j] && !ptr.is_null() && n > 0 {
                slice::from_raw_parts_mut(ptr, n).copy_from_slice(&output_scratch[j][..n]);
            }
        }
    }
}

/// Returns true if two `n`-sample regions share any memory.
fn overlaps<S>(a: *const S, b: *const S, n: usize) -> bool {
    if a.is_null() || b.is_null() || n == 0 {
        return false;
    }
    let bytes = n * mem::size_of::<S>();
    let (a, b) = (a as usize, b as usize);
    a < b + bytes && b < a + bytes
}

// Raw pointers are only dereferenced inside `render`, which the host
// serializes with every other call on the instance.
unsafe impl<S: Sample> Send for SignalStorage<S> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum_into_first_output<S: Sample>(buffer: &mut Buffer<'_, S>) {
        let inputs: Vec<&[S]> = buffer.inputs().collect();
        if let Some(out) = buffer.output(0) {
            for (k, o) in out.iter_mut().enumerate() {
                *o = inputs.iter().fold(S::ZERO, |acc, ch| acc + ch[k]);
            }
        }
    }

    #[test]
    fn test_pack_layout() {
        let a = [0.0f32; 64];
        let b = [0.0f32; 64];
        let mut c = [0.0f32; 64];
        let args = PerformArgs::pack(0xdead, &[a.as_ptr(), b.as_ptr()], &[c.as_mut_ptr()], 64);
        assert_eq!(args.len(), perform_arg_count(2, 1));
        assert_eq!(args.object(), 0xdead);
        assert_eq!(
            args.buffers(),
            &[
                a.as_ptr() as usize,
                b.as_ptr() as usize,
                c.as_mut_ptr() as usize,
                64
            ]
        );
    }

    #[test]
    fn test_packed_round_trip_order() {
        let in0 = [1.0f32; 64];
        let in1 = [2.0f32; 64];
        let mut out0 = [0.0f32; 64];
        let args = PerformArgs::pack(0, &[in0.as_ptr(), in1.as_ptr()], &[out0.as_mut_ptr()], 64);

        let mut storage = SignalStorage::<f32>::allocate(2, 1, 64);
        let n = storage.collect_packed(args.buffers());
        assert_eq!(n, 64);

        let mut seen = (0.0, 0.0, 0, 0);
        unsafe {
            storage.render(n, |buffer| {
                seen = (
                    buffer.input(0)[0],
                    buffer.input(1)[0],
                    buffer.num_output_channels(),
                    buffer.num_samples(),
                );
                sum_into_first_output(buffer);
            });
        }
        assert_eq!(seen, (1.0, 2.0, 1, 64));
        assert!(out0.iter().all(|&s| s == 3.0));
    }

    #[test]
    fn test_short_packed_list() {
        let mut storage = SignalStorage::<f32>::allocate(2, 1, 8);
        assert_eq!(storage.collect_packed(&[1, 2]), 0);
    }

    #[test]
    fn test_in_place_input_is_copied() {
        // Input 0 and output 0 share memory; input 1 is separate.
        let mut shared = vec![1.0f64; 8];
        let other = vec![10.0f64; 8];
        let mut storage = SignalStorage::<f64>::allocate(2, 1, 8);
        storage.collect(
            &[shared.as_ptr(), other.as_ptr()],
            &[shared.as_mut_ptr()],
        );
        unsafe {
            storage.render(8, |buffer| {
                // Writing output must not disturb the input view.
                let first = buffer.input(0);
                if let Some(out) = buffer.output(0) {
                    out.fill(0.0);
                }
                assert_eq!(first, &[1.0; 8]);
                sum_into_first_output(buffer);
            });
        }
        assert!(shared.iter().all(|&s| s == 11.0));
    }

    #[test]
    fn test_duplicate_outputs_use_scratch() {
        let input = vec![2.0f32; 4];
        let mut out = vec![0.0f32; 4];
        let mut storage = SignalStorage::<f32>::allocate(1, 2, 4);
        storage.collect(&[input.as_ptr()], &[out.as_mut_ptr(), out.as_mut_ptr()]);
        unsafe {
            storage.render(4, |buffer| {
                let i = buffer.input(0);
                if let Some(o) = buffer.output(0) {
                    o.copy_from_slice(i);
                }
                if let Some(o) = buffer.output(1) {
                    o.fill(5.0);
                }
            });
        }
        // Later outlet wins, as with two writers into one host buffer.
        assert_eq!(out, vec![5.0; 4]);
    }

    #[test]
    fn test_null_and_zero_channels() {
        let mut storage = SignalStorage::<f32>::allocate(0, 0, 16);
        storage.collect(&[], &[]);
        let mut called = false;
        unsafe {
            storage.render(16, |buffer| {
                called = true;
                assert_eq!(buffer.num_input_channels(), 0);
                assert_eq!(buffer.num_output_channels(), 0);
            });
        }
        assert!(called);

        let mut storage = SignalStorage::<f32>::allocate(1, 0, 4);
        storage.collect(&[], &[]);
        unsafe {
            storage.render(4, |buffer| assert_eq!(buffer.input(0), &[0.0; 4]));
        }
    }

    #[test]
    fn test_oversized_block_grows_scratch() {
        let input = vec![1.0f32; 32];
        let mut out = vec![0.0f32; 32];
        let mut storage = SignalStorage::<f32>::allocate(1, 1, 8);
        storage.collect(&[input.as_ptr()], &[out.as_mut_ptr()]);
        unsafe {
            storage.render(32, |buffer| {
                let i = buffer.input(0);
                if let Some(o) = buffer.output(0) {
                    o.copy_from_slice(i);
                }
            });
        }
        assert_eq!(storage.max_block(), 32);
        assert_eq!(out, input);
    }
}
