// ============================================================
// Layer 5 - T5 Encoder-Decoder (Burn)
// ============================================================
// The standard T5 architecture, laid out so that parameter
// paths line up with the pretrained checkpoint after a small
// key remap (see infra::pretrained):
//
//   shared                       token embedding (encoder + decoder)
//   encoder / decoder            Stack
//     block[i].self_attn          RMS norm → attention → residual
//     block[i].cross_attn         decoder only, attends to encoder
//     block[i].ff                 RMS norm → relu / gated-gelu MLP → residual
//     relative_attention_bias     bucketed position bias, shared by layers
//     final_layer_norm
//   lm_head                      only when embeddings are untied
//
// Reference: Raffel et al. (2020) T5 paper
//            Burn Book §3 (Building Blocks)

use burn::{
    nn::{
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
        RmsNorm, RmsNormConfig,
    },
    prelude::*,
    tensor::activation,
};

use crate::ml::config::{FeedForwardKind, T5Config};
use crate::ml::loss::masked_cross_entropy;
use crate::ml::position::relative_position_buckets;

/// Additive bias for positions that must not be attended to.
/// Large but finite so fully-masked rows still softmax to a number.
const MASKED: f32 = -1e9;

impl T5Config {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SummarizerModel<B> {
        let shared  = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let encoder = self.build_stack(self.num_layers, false, device);
        let decoder = self.build_stack(self.decoder_layers(), true, device);
        let lm_head = (!self.tie_word_embeddings).then(|| {
            LinearConfig::new(self.d_model, self.vocab_size)
                .with_bias(false)
                .init(device)
        });
        SummarizerModel {
            shared, encoder, decoder, lm_head,
            d_model: self.d_model,
        }
    }

    fn build_stack<B: Backend>(&self, layers: usize, is_decoder: bool, device: &B::Device) -> Stack<B> {
        let block = (0..layers)
            .map(|_| self.build_block(is_decoder, device))
            .collect();
        Stack {
            block,
            relative_attention_bias: EmbeddingConfig::new(
                self.relative_attention_num_buckets, self.num_heads,
            ).init(device),
            final_layer_norm: self.norm(device),
            dropout:          DropoutConfig::new(self.dropout_rate).init(),
            is_decoder,
            num_buckets:      self.relative_attention_num_buckets,
            max_distance:     self.relative_attention_max_distance,
        }
    }

    fn build_block<B: Backend>(&self, is_decoder: bool, device: &B::Device) -> Block<B> {
        Block {
            self_attn:  self.build_attention_layer(device),
            cross_attn: is_decoder.then(|| self.build_attention_layer(device)),
            ff:         self.build_feed_forward(device),
        }
    }

    fn build_attention_layer<B: Backend>(&self, device: &B::Device) -> AttentionLayer<B> {
        let inner = self.inner_dim();
        let proj = |i, o| LinearConfig::new(i, o).with_bias(false).init(device);
        AttentionLayer {
            attention: Attention {
                q: proj(self.d_model, inner),
                k: proj(self.d_model, inner),
                v: proj(self.d_model, inner),
                o: proj(inner, self.d_model),
                dropout: DropoutConfig::new(self.dropout_rate).init(),
                n_heads: self.num_heads,
                d_kv:    self.d_kv,
            },
            layer_norm: self.norm(device),
            dropout:    DropoutConfig::new(self.dropout_rate).init(),
        }
    }

    fn build_feed_forward<B: Backend>(&self, device: &B::Device) -> FeedForward<B> {
        let proj = |i, o| LinearConfig::new(i, o).with_bias(false).init(device);
        let gated = matches!(self.feed_forward(), Ok(FeedForwardKind::GatedGelu));
        FeedForward {
            wi_0: proj(self.d_model, self.d_ff),
            wi_1: gated.then(|| proj(self.d_model, self.d_ff)),
            wo:   proj(self.d_ff, self.d_model),
            layer_norm: self.norm(device),
            dropout:    DropoutConfig::new(self.dropout_rate).init(),
        }
    }

    fn norm<B: Backend>(&self, device: &B::Device) -> RmsNorm<B> {
        RmsNormConfig::new(self.d_model)
            .with_epsilon(self.layer_norm_epsilon)
            .init(device)
    }
}

// ─── Attention ────────────────────────────────────────────────────────────────
// Multi-head attention without the 1/sqrt(d) score scaling: T5
// folds that factor into the initialisation of `q`.
#[derive(Module, Debug)]
pub struct Attention<B: Backend> {
    pub q: Linear<B>,
    pub k: Linear<B>,
    pub v: Linear<B>,
    pub o: Linear<B>,
    pub dropout: Dropout,
    pub n_heads: usize,
    pub d_kv:    usize,
}

impl<B: Backend> Attention<B> {
    /// query: [batch, q_len, d_model], key_value: [batch, k_len, d_model].
    /// `position_bias` is [1, heads, q_len, k_len]; `mask` is additive and
    /// broadcastable to [batch, 1, q_len, k_len].
    pub fn forward(
        &self,
        query:         Tensor<B, 3>,
        key_value:     Tensor<B, 3>,
        position_bias: Option<Tensor<B, 4>>,
        mask:          Tensor<B, 4>,
    ) -> Tensor<B, 3> {
        let [batch, q_len, _] = query.dims();
        let [_, k_len, _]     = key_value.dims();

        let q = self.split_heads(self.q.forward(query), batch, q_len);
        let k = self.split_heads(self.k.forward(key_value.clone()), batch, k_len);
        let v = self.split_heads(self.v.forward(key_value), batch, k_len);

        let mut scores = q.matmul(k.transpose());               // [b, h, q, k]
        if let Some(bias) = position_bias {
            scores = scores + bias;
        }
        let scores  = scores + mask;
        let weights = self.dropout.forward(activation::softmax(scores, 3));
        let context = weights
            .matmul(v)                                          // [b, h, q, d_kv]
            .swap_dims(1, 2)
            .reshape([batch, q_len, self.n_heads * self.d_kv]);
        self.o.forward(context)
    }

    fn split_heads(&self, x: Tensor<B, 3>, batch: usize, len: usize) -> Tensor<B, 4> {
        x.reshape([batch, len, self.n_heads, self.d_kv]).swap_dims(1, 2)
    }
}

/// Pre-norm residual wrapper around one attention call.
#[derive(Module, Debug)]
pub struct AttentionLayer<B: Backend> {
    pub attention:  Attention<B>,
    pub layer_norm: RmsNorm<B>,
    pub dropout:    Dropout,
}

impl<B: Backend> AttentionLayer<B> {
    /// Self-attention when `memory` is None, cross-attention otherwise.
    pub fn forward(
        &self,
        x:             Tensor<B, 3>,
        memory:        Option<Tensor<B, 3>>,
        position_bias: Option<Tensor<B, 4>>,
        mask:          Tensor<B, 4>,
    ) -> Tensor<B, 3> {
        let normed = self.layer_norm.forward(x.clone());
        let kv     = memory.unwrap_or_else(|| normed.clone());
        let out    = self.attention.forward(normed, kv, position_bias, mask);
        x + self.dropout.forward(out)
    }
}

#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    pub wi_0: Linear<B>,
    /// Present only for the gated-gelu variant.
    pub wi_1: Option<Linear<B>>,
    pub wo:   Linear<B>,
    pub layer_norm: RmsNorm<B>,
    pub dropout:    Dropout,
}

/// Tanh approximation of GELU, the activation gated-gelu checkpoints were trained with:
/// 0.5 * x * (1 + tanh(sqrt(2/pi) * (x + 0.044715 * x^3)))
pub fn gelu_tanh<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    let cube  = x.clone() * x.clone() * x.clone();
    let inner = (x.clone() + cube.mul_scalar(0.044715)).mul_scalar((2.0 / std::f64::consts::PI).sqrt());
    x.mul_scalar(0.5) * inner.tanh().add_scalar(1.0)
}

impl<B: Backend> FeedForward<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let h = self.layer_norm.forward(x.clone());
        let h = match &self.wi_1 {
            Some(wi_1) => gelu_tanh(self.wi_0.forward(h.clone())) * wi_1.forward(h),
            None => activation::relu(self.wi_0.forward(h)),
        };
        let h = self.wo.forward(self.dropout.forward(h));
        x + self.dropout.forward(h)
    }
}

#[derive(Module, Debug)]
pub struct Block<B: Backend> {
    pub self_attn:  AttentionLayer<B>,
    pub cross_attn: Option<AttentionLayer<B>>,
    pub ff:         FeedForward<B>,
}

// ─── Stack ────────────────────────────────────────────────────────────────────
// One encoder or decoder. The relative position bias is computed
// once per forward pass and added in every layer.
#[derive(Module, Debug)]
pub struct Stack<B: Backend> {
    pub block: Vec<Block<B>>,
    pub relative_attention_bias: Embedding<B>,
    pub final_layer_norm: RmsNorm<B>,
    pub dropout:      Dropout,
    pub is_decoder:   bool,
    pub num_buckets:  usize,
    pub max_distance: usize,
}

impl<B: Backend> Stack<B> {
    /// embeds: [batch, len, d_model]; self_mask: additive, broadcastable to
    /// [batch, 1, len, len]; memory: encoder output and its additive mask.
    pub fn forward(
        &self,
        embeds:    Tensor<B, 3>,
        self_mask: Tensor<B, 4>,
        memory:    Option<(Tensor<B, 3>, Tensor<B, 4>)>,
    ) -> Tensor<B, 3> {
        let [_, len, _]   = embeds.dims();
        let device        = embeds.device();
        let position_bias = self.position_bias(len, len, &device);

        let mut x = self.dropout.forward(embeds);
        for block in &self.block {
            x = block.self_attn.forward(x, None, Some(position_bias.clone()), self_mask.clone());
            if let (Some(cross), Some((enc_out, enc_mask))) = (&block.cross_attn, &memory) {
                x = cross.forward(x, Some(enc_out.clone()), None, enc_mask.clone());
            }
            x = block.ff.forward(x);
        }
        self.dropout.forward(self.final_layer_norm.forward(x))
    }

    /// [1, heads, q_len, k_len] learned bias for every query/key offset.
    fn position_bias(&self, q_len: usize, k_len: usize, device: &B::Device) -> Tensor<B, 4> {
        let buckets = relative_position_buckets(
            q_len, k_len, !self.is_decoder, self.num_buckets, self.max_distance,
        );
        let buckets = Tensor::<B, 2, Int>::from_data(TensorData::new(buckets, [q_len, k_len]), device);
        self.relative_attention_bias
            .forward(buckets)           // [q, k, heads]
            .permute([2, 0, 1])         // [heads, q, k]
            .unsqueeze::<4>()
    }
}

// ─── SummarizerModel ──────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct SummarizerModel<B: Backend> {
    pub shared:  Embedding<B>,
    pub encoder: Stack<B>,
    pub decoder: Stack<B>,
    /// Separate output projection; None when tied to `shared`.
    pub lm_head: Option<Linear<B>>,
    pub d_model: usize,
}

impl<B: Backend> SummarizerModel<B> {
    /// input_ids, attention_mask: [batch, src_len] → [batch, src_len, d_model]
    pub fn encode(&self, input_ids: Tensor<B, 2, Int>, attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let embeds = self.shared.forward(input_ids);
        self.encoder.forward(embeds, padding_bias(attention_mask), None)
    }

    /// decoder_input_ids: [batch, tgt_len] → logits [batch, tgt_len, vocab]
    pub fn decode(
        &self,
        decoder_input_ids: Tensor<B, 2, Int>,
        encoder_out:       Tensor<B, 3>,
        attention_mask:    Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let [_, tgt_len] = decoder_input_ids.dims();
        let device  = decoder_input_ids.device();
        let embeds  = self.shared.forward(decoder_input_ids);
        let hidden  = self.decoder.forward(
            embeds,
            causal_bias(tgt_len, &device),
            Some((encoder_out, padding_bias(attention_mask))),
        );
        self.project(hidden)
    }

    pub fn forward(
        &self,
        input_ids:         Tensor<B, 2, Int>,
        attention_mask:    Tensor<B, 2, Int>,
        decoder_input_ids: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let encoder_out = self.encode(input_ids, attention_mask.clone());
        self.decode(decoder_input_ids, encoder_out, attention_mask)
    }

    /// Mean cross entropy over label positions that are not the ignore sentinel.
    pub fn forward_loss(
        &self,
        input_ids:         Tensor<B, 2, Int>,
        attention_mask:    Tensor<B, 2, Int>,
        decoder_input_ids: Tensor<B, 2, Int>,
        labels:            Tensor<B, 2, Int>,
    ) -> (Tensor<B, 1>, Tensor<B, 3>) {
        let logits = self.forward(input_ids, attention_mask, decoder_input_ids);
        let loss   = masked_cross_entropy(logits.clone(), labels);
        (loss, logits)
    }

    fn project(&self, hidden: Tensor<B, 3>) -> Tensor<B, 3> {
        match &self.lm_head {
            Some(head) => head.forward(hidden),
            None => {
                // Tied embeddings are rescaled before reuse as the output matrix.
                let [batch, len, d_model] = hidden.dims();
                let hidden = hidden.mul_scalar((self.d_model as f64).powf(-0.5));
                let weight = self.shared.weight.val();          // [vocab, d_model]
                let [vocab, _] = weight.dims();
                hidden
                    .reshape([batch * len, d_model])
                    .matmul(weight.transpose())
                    .reshape([batch, len, vocab])
            }
        }
    }
}

/// attention_mask [batch, len] (1 = token, 0 = pad) → additive [batch, 1, 1, len].
pub fn padding_bias<B: Backend>(attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 4> {
    let [batch, len] = attention_mask.dims();
    attention_mask
        .float()
        .sub_scalar(1.0)
        .mul_scalar(-MASKED)
        .reshape([batch, 1, 1, len])
}

/// Additive [1, 1, len, len] mask hiding future positions.
pub fn causal_bias<B: Backend>(len: usize, device: &B::Device) -> Tensor<B, 4> {
    let mut values = Vec::with_capacity(len * len);
    for q in 0..len {
        for k in 0..len {
            values.push(if k > q { MASKED } else { 0.0 });
        }
    }
    Tensor::<B, 2>::from_data(TensorData::new(values, [len, len]), device).unsqueeze::<4>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{tiny_config, TestBackend};

    fn ints(values: Vec<i64>, shape: [usize; 2]) -> Tensor<TestBackend, 2, Int> {
        Tensor::from_data(TensorData::new(values, shape), &Default::default())
    }

    #[test]
    fn test_gelu_tanh_matches_known_values() {
        let x = Tensor::<TestBackend, 1>::from_floats([0.0, 1.0, -2.0, 3.0], &Default::default());
        let y = gelu_tanh(x).into_data().to_vec::<f32>().unwrap();
        let expected = [0.0f32, 0.841192, -0.04540229, 2.9963627];
        for (got, want) in y.iter().zip(expected) {
            assert!((got - want).abs() < 1e-5, "{got} vs {want}");
        }
    }

    #[test]
    fn test_forward_shapes() {
        let cfg   = tiny_config();
        let model = cfg.init::<TestBackend>(&Default::default());

        let input = ints(vec![5, 6, 7, 1, 0, 8, 9, 1, 0, 0], [2, 5]);
        let mask  = ints(vec![1, 1, 1, 1, 0, 1, 1, 1, 0, 0], [2, 5]);
        let dec   = ints(vec![0, 5, 6, 0, 8, 9], [2, 3]);

        let logits = model.forward(input, mask, dec);
        assert_eq!(logits.dims(), [2, 3, cfg.vocab_size]);
    }

    #[test]
    fn test_padding_bias_values() {
        let mask = ints(vec![1, 1, 0], [1, 3]);
        let bias = padding_bias(mask);
        assert_eq!(bias.dims(), [1, 1, 1, 3]);
        let values = bias.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![0.0, 0.0, MASKED]);
    }

    #[test]
    fn test_causal_bias_hides_future() {
        let bias = causal_bias::<TestBackend>(3, &Default::default());
        let values = bias.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![
            0.0, MASKED, MASKED,
            0.0, 0.0,    MASKED,
            0.0, 0.0,    0.0,
        ]);
    }

    #[test]
    fn test_padding_does_not_change_real_positions() {
        // Appending pad tokens to the source must leave decoder logits untouched.
        let cfg   = tiny_config();
        let model = cfg.init::<TestBackend>(&Default::default());
        let dec   = ints(vec![0, 5], [1, 2]);

        let short = model.forward(ints(vec![5, 6, 1], [1, 3]), ints(vec![1, 1, 1], [1, 3]), dec.clone());
        let long  = model.forward(
            ints(vec![5, 6, 1, 0, 0], [1, 5]),
            ints(vec![1, 1, 1, 0, 0], [1, 5]),
            dec,
        );

        let a = short.into_data().to_vec::<f32>().unwrap();
        let b = long.into_data().to_vec::<f32>().unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-4, "{x} vs {y}");
        }
    }

    #[test]
    fn test_untied_model_has_lm_head() {
        let mut cfg = tiny_config();
        cfg.tie_word_embeddings = false;
        cfg.feed_forward_proj = "gated-gelu".into();
        let model = cfg.init::<TestBackend>(&Default::default());
        assert!(model.lm_head.is_some());
        assert!(model.decoder.block[0].ff.wi_1.is_some());
        assert!(model.encoder.block[0].cross_attn.is_none());

        let logits = model.forward(
            ints(vec![5, 1], [1, 2]),
            ints(vec![1, 1], [1, 2]),
            ints(vec![0], [1, 1]),
        );
        assert_eq!(logits.dims(), [1, 1, cfg.vocab_size]);
    }
}
