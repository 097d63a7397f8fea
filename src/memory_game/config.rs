use anyhow::bail;
use burn::config::Config;

/// Memory sizes left as `None` are derived from `cards`.
#[derive(Config, Debug)]
pub struct MemoryGameConfig {
    #[config(default = 4)]
    pub cards: usize,
    /// Expert episodes per update.
    #[config(default = 16)]
    pub batch_size: usize,
    /// Expert episodes between two evaluations.
    #[config(default = 128)]
    pub evaluate_each: usize,
    #[config(default = 100)]
    pub evaluate_for: usize,
    pub hidden_layer: Option<usize>,
    pub memory_cells: Option<usize>,
    pub memory_cell_size: Option<usize>,
    /// Expert episodes before the final evaluation starts.
    #[config(default = 4096)]
    pub max_episodes: usize,
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = 0)]
    pub render_each: usize,
}

impl MemoryGameConfig {
    pub fn hidden_layer(&self) -> usize {
        self.hidden_layer.unwrap_or(8 * self.cards)
    }

    pub fn memory_cells(&self) -> usize {
        self.memory_cells.unwrap_or(2 * self.cards)
    }

    pub fn memory_cell_size(&self) -> usize {
        self.memory_cell_size.unwrap_or(3 * self.cards / 2)
    }

    /// Length of the one-hot `(card, symbol)` encoding.
    pub fn encoding_size(&self) -> usize {
        self.cards + self.cards / 2
    }

    /// Training batches between two evaluations, at least one.
    pub fn batches_per_evaluation(&self) -> usize {
        (self.evaluate_each / self.batch_size.max(1)).max(1)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cards < 2 || self.cards % 2 != 0 {
            bail!("the number of cards must be even and at least 2, got {}", self.cards);
        }
        if self.batch_size == 0 {
            bail!("the batch size must be positive");
        }
        if self.memory_cells() == 0 || self.hidden_layer() == 0 {
            bail!("the memory and the hidden layer must not be empty");
        }
        if self.memory_cell_size() != self.encoding_size() {
            bail!(
                "memory cell size {} does not match the {}-dimensional encoding of {} cards",
                self.memory_cell_size(),
                self.encoding_size(),
                self.cards
            );
        }
        Ok(())
    }
}
