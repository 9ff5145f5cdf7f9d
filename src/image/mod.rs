pub mod error;
pub mod generator;
pub mod hosting;

pub use error::ImageError;
pub use generator::{ImageGenerator, ImageGeneratorConfig};
pub use hosting::FreeImageClient;

/// Produce a hosted illustration for a brief, returning its public URL.
///
/// Implemented by [`ImagePipeline`] for the real services and by fakes in
/// orchestrator tests.
pub trait Illustrator {
    fn illustrate(
        &self,
        brief: &str,
        title: &str,
    ) -> impl Future<Output = Result<String, ImageError>> + Send;
}

/// Combines the generator and the hosting client into one step.
pub struct ImagePipeline {
    generator: ImageGenerator,
    host: FreeImageClient,
}

impl ImagePipeline {
    pub fn new(generator: ImageGenerator, host: FreeImageClient) -> Self {
        Self { generator, host }
    }
}

impl Illustrator for ImagePipeline {
    async fn illustrate(&self, brief: &str, title: &str) -> Result<String, ImageError> {
        let bytes = self.generator.generate(brief).await?;
        self.host.upload(bytes, title).await
    }
}
