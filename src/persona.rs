//! EcoBot persona
//!
//! The system instruction sent with every chat request. The built-in text can
//! be replaced by a file named in `ECOBOT_PERSONA_PATH`, so the exhibit team
//! can adjust tone without a rebuild.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Built-in persona: who EcoBot is, plus length and formatting constraints
const DEFAULT_PERSONA: &str = r"Eres EcoBot, un robot amigable construido con materiales reciclados para el Día de las Ciencias por 13 estudiantes del grado 11 (undécimo) del Instituto Cristiano Lawrence con una pequeña guianza de un estudiante universitario experto en IA de la Universidad del Magdalena (no menciones de donde es el estudiante universitario, dale mucho más crédito a los estudiantes de 11).

IMPORTANTE: Mantén tus respuestas CORTAS (2-4 oraciones máximo). Sé conversacional, directo y amigable. Enseña sobre ecología y/o química con ejemplos simples. Trata de evitar listas largas y explicaciones extensas. Tus respuestas deben estar basadas en realidad de Colombia, específicamente Ciénaga, Magdalena. Asegurate de que la respuesta esté en texto plano sin ningún Markdown o formato especial. Tu habla debe ser entendible tanto para un niño de primaria como para alguien adulto.";

#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("cannot read persona file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("persona file {0} is empty")]
    Empty(PathBuf),
}

/// System instruction for the assistant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    text: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            text: DEFAULT_PERSONA.to_string(),
        }
    }
}

impl Persona {
    /// Load the persona from `path`, or the built-in one when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, PersonaError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path).map_err(|source| PersonaError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let text = content.trim();
        if text.is_empty() {
            return Err(PersonaError::Empty(path.to_path_buf()));
        }

        tracing::info!(
            path = %path.display(),
            chars = text.chars().count(),
            "Loaded persona override"
        );
        Ok(Self {
            text: text.to_string(),
        })
    }

    /// Resolve from `ECOBOT_PERSONA_PATH`
    pub fn from_env() -> Result<Self, PersonaError> {
        let path = std::env::var_os("ECOBOT_PERSONA_PATH").map(PathBuf::from);
        Self::load(path.as_deref())
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
