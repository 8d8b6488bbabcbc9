use crate::generators::{Generator, ProgramOptions};
use ignis_device::{Device, ProgramId};
use std::collections::HashMap;
use tracing::{debug, error};

/// Compiles each distinct option set once and hands out the cached program afterwards.
#[derive(Debug, Default)]
pub struct ProgramLibrary {
    cache: HashMap<String, ProgramId>,
    generated: usize,
}

impl ProgramLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    #[profiling::function]
    pub fn get_program(&mut self, device: &mut Device, options: &ProgramOptions) -> ProgramId {
        let key = options.generate_key();
        if let Some(&program) = self.cache.get(&key) {
            return program;
        }

        let definition = options.create_shader_definition(&device.capabilities());
        self.generated += 1;
        let program = device.create_program(&definition);
        debug!("Generated program {key}");
        self.cache.insert(key, program);
        program
    }

    /// Looks a generator up by name. Unknown names and options of another generator yield `None`.
    pub fn get_program_by_name(
        &mut self,
        device: &mut Device,
        name: &str,
        options: &ProgramOptions,
    ) -> Option<ProgramId> {
        let generator = match name.parse::<Generator>() {
            Ok(generator) => generator,
            Err(e) => {
                error!("{e}");
                return None;
            }
        };

        if generator != options.generator() {
            error!(
                "Program generator {generator} was given options for {}",
                options.generator()
            );
            return None;
        }

        Some(self.get_program(device, options))
    }

    /// Number of times a generator actually ran.
    pub fn generated(&self) -> usize {
        self.generated
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self, device: &mut Device) {
        for (_, program) in self.cache.drain() {
            device.destroy_program(program);
        }
    }
}
