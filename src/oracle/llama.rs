//! Local GGUF backend through llama.cpp. Enabled with `--features llama`.

use std::cell::RefCell;
use std::num::NonZeroU32;
use std::pin::pin;
use std::time::Duration;

use log::{debug, info, trace};

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::context::LlamaContext;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaChatMessage, LlamaModel};
use llama_cpp_2::sampling::LlamaSampler;

use crate::error::{ConfigError, OracleError};
use crate::oracle::{Backend, Deadline};

pub struct ModelConfig {
    /// How many layers to offload to GPU (0 = CPU only).
    pub n_gpu_layers: u32,
    /// Context window size in tokens.
    pub n_ctx: u32,
    /// Maximum tokens to generate per completion. Reasoning models need room
    /// for their `<think>` block before the answer.
    pub max_tokens: usize,
    /// Wall-clock bound on one completion, prompt decoding included.
    pub timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_gpu_layers: 0,
            n_ctx: 4096,
            max_tokens: 512,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Greedy sampling: the oracle should answer the same way every time.
fn build_sampler() -> LlamaSampler {
    LlamaSampler::chain_simple([LlamaSampler::greedy()])
}

pub struct LocalLlama {
    model: &'static LlamaModel,
    ctx: RefCell<LlamaContext<'static>>,
    n_ctx: u32,
    max_tokens: usize,
    timeout: Duration,
}

impl LocalLlama {
    pub fn load_model(model_path: &str, config: ModelConfig) -> Result<Self, ConfigError> {
        let setting = |message: String| ConfigError::InvalidSetting {
            name: "model path",
            message,
        };

        // The backend and model live for the rest of the process; the
        // context borrows both.
        let backend: &'static LlamaBackend = Box::leak(Box::new(
            LlamaBackend::init().map_err(|e| setting(format!("failed to init llama backend: {e}")))?,
        ));

        info!("Loading model from: {model_path}");
        info!(
            "  config: n_gpu_layers={}, n_ctx={}, max_tokens={}, timeout={:?}",
            config.n_gpu_layers, config.n_ctx, config.max_tokens, config.timeout
        );

        let model_params = pin!(LlamaModelParams::default().with_n_gpu_layers(config.n_gpu_layers));
        let model: &'static LlamaModel = Box::leak(Box::new(
            LlamaModel::load_from_file(backend, model_path, &model_params)
                .map_err(|e| setting(format!("failed to load model: {e}")))?,
        ));

        let n_ctx = NonZeroU32::new(config.n_ctx).ok_or_else(|| ConfigError::InvalidSetting {
            name: "n_ctx",
            message: "must be > 0".into(),
        })?;
        let ctx = model
            .new_context(backend, LlamaContextParams::default().with_n_ctx(Some(n_ctx)))
            .map_err(|e| setting(format!("failed to create inference context: {e}")))?;

        info!("Model loaded successfully");

        Ok(Self {
            model,
            ctx: RefCell::new(ctx),
            n_ctx: config.n_ctx,
            max_tokens: config.max_tokens,
            timeout: config.timeout,
        })
    }

    /// Tokenize the prompt, feed it, sample until end-of-generation.
    fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        let deadline = Deadline::after(self.timeout);
        let local = |what: &str, e: &dyn std::fmt::Display| OracleError::Local(format!("{what}: {e}"));
        let mut ctx = self.ctx.borrow_mut();
        ctx.clear_kv_cache();

        let msgs = vec![LlamaChatMessage::new("user".into(), prompt.to_string())
            .map_err(|e| local("failed to create chat message", &e))?];
        let tmpl = self
            .model
            .chat_template(None)
            .map_err(|e| local("model has no chat template", &e))?;
        let rendered = self
            .model
            .apply_chat_template(&tmpl, &msgs, true)
            .map_err(|e| local("failed to apply chat template", &e))?;

        trace!("=== RENDERED PROMPT ===\n{rendered}\n=== END PROMPT ===");

        let tokens = self
            .model
            .str_to_token(&rendered, AddBos::Always)
            .map_err(|e| local("tokenization failed", &e))?;
        debug!("Prompt tokenized: {} tokens", tokens.len());

        let mut batch = LlamaBatch::new(self.n_ctx as usize, 1);
        let last_idx = tokens.len() as i32 - 1;
        for (i, tok) in (0i32..).zip(tokens.iter()) {
            batch
                .add(*tok, i, &[0], i == last_idx)
                .map_err(|e| local("batch add failed", &e))?;
        }
        ctx.decode(&mut batch)
            .map_err(|e| local("initial decode failed", &e))?;
        deadline.check()?;

        let mut sampler = build_sampler();
        let mut output = String::new();
        let mut decoder = encoding_rs::UTF_8.new_decoder();
        let mut n_cur = batch.n_tokens();

        for _ in 0..self.max_tokens {
            deadline.check()?;
            let tok = sampler.sample(&ctx, batch.n_tokens() - 1);
            sampler.accept(tok);

            if self.model.is_eog_token(tok) {
                break;
            }

            let piece = self
                .model
                .token_to_piece(tok, &mut decoder, true, None)
                .map_err(|e| local("token_to_piece failed", &e))?;
            output.push_str(&piece);

            batch.clear();
            batch
                .add(tok, n_cur, &[0], true)
                .map_err(|e| local("batch add failed", &e))?;
            ctx.decode(&mut batch)
                .map_err(|e| local("decode step failed", &e))?;
            n_cur += 1;
        }

        debug!("Local model output ({} chars): {output:?}", output.len());
        Ok(output)
    }
}

impl Backend for LocalLlama {
    fn name(&self) -> &str {
        "llama"
    }

    fn complete(&self, prompt: &str) -> Result<String, OracleError> {
        self.generate(prompt)
    }
}
