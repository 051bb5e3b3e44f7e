//! Artifact and package catalogue
//!
//! Fixed names of everything the stages install or download. Model choices
//! follow the plan's tier; the largest models sit behind the plan's
//! secondary gate.

use crate::download::DownloadTask;
use crate::logic::resolver::InstallPlan;
use crate::tools::ToolRequirement;
use crate::types::Tier;

/// A downloadable file with a fixed source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileArtifact {
    /// File name inside the artifact directory
    pub id: &'static str,
    pub display_name: &'static str,
    pub url: &'static str,
}

impl FileArtifact {
    pub fn task(&self) -> DownloadTask {
        DownloadTask::new(self.id, self.display_name)
    }
}

/// A model pulled through the model registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelArtifact {
    pub id: &'static str,
    pub display_name: &'static str,
}

impl ModelArtifact {
    pub fn task(&self) -> DownloadTask {
        DownloadTask::new(self.id, self.display_name)
    }
}

// ============================================================================
// Packages
// ============================================================================

pub const SYSTEM_PACKAGES: &[&str] = &["curl", "git", "python3", "ffmpeg", "ufw"];

pub const MODEL_RUNTIME: ToolRequirement = ToolRequirement::new("ollama", "ollama");

pub const ENCRYPTION_PACKAGES: &[&str] = &["cryptsetup", "gnupg"];

pub const DOCS_PACKAGES: &[&str] = &["man-db", "zeal"];

/// Serves the offline corpora
pub const CORPUS_READER: ToolRequirement = ToolRequirement::new("kiwix-serve", "kiwix-tools");

pub const DESKTOP_PACKAGES: &[&str] = &["xfce4", "lightdm"];

pub const IMAGE_GEN_PACKAGES: &[&str] = &["python3-venv", "python3-pip"];

// ============================================================================
// Models
// ============================================================================

const EMBEDDING_MODEL: ModelArtifact = ModelArtifact {
    id: "nomic-embed-text",
    display_name: "Embedding model",
};

pub const fn chat_model(tier: Tier) -> ModelArtifact {
    match tier {
        Tier::Minimal => ModelArtifact {
            id: "llama3.2:1b",
            display_name: "Chat model (1B)",
        },
        Tier::Basic => ModelArtifact {
            id: "llama3.2:3b",
            display_name: "Chat model (3B)",
        },
        Tier::Standard => ModelArtifact {
            id: "llama3.1:8b",
            display_name: "Chat model (8B)",
        },
        Tier::Performance => ModelArtifact {
            id: "qwen2.5:14b",
            display_name: "Chat model (14B)",
        },
    }
}

/// Models every run needs
pub fn core_models(plan: &InstallPlan) -> Vec<ModelArtifact> {
    vec![chat_model(plan.tier), EMBEDDING_MODEL]
}

/// Models fetched only behind the large-artifact gate
pub fn large_models(plan: &InstallPlan) -> Vec<ModelArtifact> {
    if !plan.large_artifacts {
        return Vec::new();
    }
    vec![
        ModelArtifact {
            id: "llama3.3:70b",
            display_name: "Large chat model (70B)",
        },
        ModelArtifact {
            id: "qwen2.5-coder:32b",
            display_name: "Large code model (32B)",
        },
    ]
}

// ============================================================================
// Files
// ============================================================================

pub const VOICE_ASSETS: &[FileArtifact] = &[
    FileArtifact {
        id: "en_US-lessac-medium.onnx",
        display_name: "Voice model",
        url: "https://huggingface.co/rhasspy/piper-voices/resolve/main/en/en_US/lessac/medium/en_US-lessac-medium.onnx",
    },
    FileArtifact {
        id: "en_US-lessac-medium.onnx.json",
        display_name: "Voice model config",
        url: "https://huggingface.co/rhasspy/piper-voices/resolve/main/en/en_US/lessac/medium/en_US-lessac-medium.onnx.json",
    },
    FileArtifact {
        id: "ggml-base.en.bin",
        display_name: "Speech recognition model",
        url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.en.bin",
    },
];

const WIKIPEDIA_MINI: FileArtifact = FileArtifact {
    id: "wikipedia_en_all_mini.zim",
    display_name: "Wikipedia (mini)",
    url: "https://download.kiwix.org/zim/wikipedia/wikipedia_en_all_mini_2024-06.zim",
};

const WIKIPEDIA_NOPIC: FileArtifact = FileArtifact {
    id: "wikipedia_en_all_nopic.zim",
    display_name: "Wikipedia (no pictures)",
    url: "https://download.kiwix.org/zim/wikipedia/wikipedia_en_all_nopic_2024-06.zim",
};

const WIKIPEDIA_MAXI: FileArtifact = FileArtifact {
    id: "wikipedia_en_all_maxi.zim",
    display_name: "Wikipedia (full)",
    url: "https://download.kiwix.org/zim/wikipedia/wikipedia_en_all_maxi_2024-01.zim",
};

/// Wikipedia variant sized for the tier
pub const fn wikipedia(tier: Tier) -> FileArtifact {
    match tier {
        Tier::Minimal | Tier::Basic => WIKIPEDIA_MINI,
        Tier::Standard => WIKIPEDIA_NOPIC,
        Tier::Performance => WIKIPEDIA_MAXI,
    }
}

pub const BOOKS: FileArtifact = FileArtifact {
    id: "gutenberg_en_all.zim",
    display_name: "Project Gutenberg library",
    url: "https://download.kiwix.org/zim/gutenberg/gutenberg_en_all_2023-08.zim",
};

pub const IMAGE_GEN_CHECKPOINT: FileArtifact = FileArtifact {
    id: "sd_xl_base_1.0.safetensors",
    display_name: "Image generation checkpoint",
    url: "https://huggingface.co/stabilityai/stable-diffusion-xl-base-1.0/resolve/main/sd_xl_base_1.0.safetensors",
};

/// Every file artifact with its source, for registering with a file client
pub fn all_file_artifacts() -> Vec<FileArtifact> {
    let mut all = VOICE_ASSETS.to_vec();
    all.extend([
        WIKIPEDIA_MINI,
        WIKIPEDIA_NOPIC,
        WIKIPEDIA_MAXI,
        BOOKS,
        IMAGE_GEN_CHECKPOINT,
    ]);
    all
}
