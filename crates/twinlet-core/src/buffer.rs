//! Signal buffers handed to [`External::process`](crate::External::process).
//!
//! A [`Buffer`] holds the input slices of every signal inlet followed by the
//! output slices of every signal outlet, in declaration order. Inputs and
//! outputs never alias: the render path copies in-place host buffers aside
//! before building the buffer.
//!
//! # Example
//!
//! ```ignore
//! fn process<S: Sample>(&mut self, buffer: &mut Buffer<S>) {
//!     let gain = S::from_f64(self.gain);
//!     for (input, output) in buffer.zip_channels() {
//!         for (i, o) in input.iter().zip(output.iter_mut()) {
//!             *o = *i * gain;
//!         }
//!     }
//! }
//! ```

use crate::sample::Sample;
use crate::types::MAX_CHANNELS;

/// One render block of signal data.
///
/// Uses fixed-size stack storage, so building a buffer never allocates.
pub struct Buffer<'a, S: Sample = f32> {
    inputs: [Option<&'a [S]>; MAX_CHANNELS],
    outputs: [Option<&'a mut [S]>; MAX_CHANNELS],
    num_input_channels: usize,
    num_output_channels: usize,
    num_samples: usize,
}

impl<'a, S: Sample> Buffer<'a, S> {
    /// Build a buffer from channel slices.
    ///
    /// Channels beyond [`MAX_CHANNELS`] are ignored; port declaration
    /// already rejects such layouts.
    #[inline]
    pub fn new(
        inputs: impl IntoIterator<Item = &'a [S]>,
        outputs: impl IntoIterator<Item = &'a mut [S]>,
        num_samples: usize,
    ) -> Self {
        let mut input_arr: [Option<&'a [S]>; MAX_CHANNELS] = [None; MAX_CHANNELS];
        let mut num_input_channels = 0;
        for (i, slice) in inputs.into_iter().take(MAX_CHANNELS).enumerate() {
            input_arr[i] = Some(slice);
            num_input_channels = i + 1;
        }

        // &mut is not Copy
        let mut output_arr: [Option<&'a mut [S]>; MAX_CHANNELS] = std::array::from_fn(|_| None);
        let mut num_output_channels = 0;
        for (i, slice) in outputs.into_iter().take(MAX_CHANNELS).enumerate() {
            output_arr[i] = Some(slice);
            num_output_channels = i + 1;
        }

        Self {
            inputs: input_arr,
            outputs: output_arr,
            num_input_channels,
            num_output_channels,
            num_samples,
        }
    }

    /// Number of samples in this block.
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    #[inline]
    pub fn num_input_channels(&self) -> usize {
        self.num_input_channels
    }

    #[inline]
    pub fn num_output_channels(&self) -> usize {
        self.num_output_channels
    }

    /// Input channel `channel`, or an empty slice if it doesn't exist.
    ///
    /// The slice borrows the host block, not the buffer, so inputs can be
    /// held while writing outputs.
    #[inline]
    pub fn input(&self, channel: usize) -> &'a [S] {
        match self.inputs.get(channel).copied().flatten() {
            Some(ch) => &ch[..self.num_samples.min(ch.len())],
            None => &[],
        }
    }

    /// Output channel `channel`, or `None` if it doesn't exist.
    #[inline]
    pub fn output(&mut self, channel: usize) -> Option<&mut [S]> {
        let n = self.num_samples;
        self.outputs
            .get_mut(channel)
            .and_then(|opt| opt.as_deref_mut())
            .map(|ch| {
                let len = n.min(ch.len());
                &mut ch[..len]
            })
    }

    pub fn inputs(&self) -> impl Iterator<Item = &'a [S]> + '_ {
        self.inputs[..self.num_input_channels]
            .iter()
            .filter_map(|opt| *opt)
    }

    pub fn outputs_mut(&mut self) -> impl Iterator<Item = &mut [S]> + use<'_, 'a, S> {
        self.outputs[..self.num_output_channels]
            .iter_mut()
            .filter_map(|opt| opt.as_deref_mut())
    }

    /// Iterate over paired (input, output) channels.
    ///
    /// Only yields channels that exist on both sides.
    pub fn zip_channels(&mut self) -> impl Iterator<Item = (&'a [S], &mut [S])> + use<'_, 'a, S> {
        let num_pairs = self.num_input_channels.min(self.num_output_channels);
        self.inputs[..num_pairs]
            .iter()
            .zip(self.outputs[..num_pairs].iter_mut())
            .filter_map(|(i, o)| match (*i, o.as_deref_mut()) {
                (Some(i), Some(o)) => Some((i, o)),
                _ => None,
            })
    }

    /// Fill every output with silence.
    pub fn clear_outputs(&mut self) {
        for output in self.outputs_mut() {
            output.fill(S::ZERO);
        }
    }
}
