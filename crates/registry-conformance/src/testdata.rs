//! Synthetic images/indices shared by tests in [`super::loader`] and by downstream crates that
//! want fixtures to exercise a backend without reimplementing the OCI builder boilerplate.
use lazy_static::lazy_static;
use oci_spec::image::{Arch, HistoryBuilder, ImageConfigurationBuilder, Os};

use super::{Image, ImageBuilder, Index, IndexBuilder, Layer, LayerBuilder};

lazy_static! {
    pub static ref BASIC_IMAGES: Vec<Image> = initialize_basic_images();
    pub static ref BASIC_INDEXES: Vec<Index> = initialize_basic_indices();
}

fn layer(contents: &str) -> Layer {
    LayerBuilder::default()
        .data(bytes::Bytes::from(contents.to_string()))
        .history(Some(
            HistoryBuilder::default()
                .comment("this layer created for testing purposes".to_string())
                .build()
                .expect("must set all required fields for history"),
        ))
        .build()
        .expect("expect valid layer")
}

fn basic_image(tag: &str, layers: &[&str]) -> Image {
    let config = ImageConfigurationBuilder::default()
        .os(Os::Linux)
        .architecture(Arch::Amd64)
        .build()
        .expect("must set all required fields for image configuration");

    ImageBuilder::default()
        .config(config)
        .tag(Some(tag.to_string()))
        .layers(layers.iter().map(|l| layer(l)).collect::<Vec<Layer>>())
        .artifact_type(None)
        .subject(None)
        .build()
        .expect("expect valid image")
}

fn initialize_basic_images() -> Vec<Image> {
    vec![
        basic_image("meow", &["layer 1", "layer 2", "layer 3"]),
        basic_image("woof", &["layer 1"]),
    ]
}

fn initialize_basic_indices() -> Vec<Index> {
    vec![IndexBuilder::default()
        .manifests(vec![
            basic_image("index-manifest-1", &["layer 1", "layer 2", "layer 3"]),
            basic_image(
                "index-manifest-2",
                &["layer 1", "layer 2", "layer 3", "layer 4"],
            ),
            basic_image("index-manifest-3", &["layer 1", "layer 4"]),
        ])
        .artifact_type(None)
        .subject(None)
        .build()
        .expect("expect valid index")]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn basic_images_have_the_layers_they_were_built_with() {
        let images = initialize_basic_images();
        assert_eq!(images[0].layers.len(), 3);
        assert_eq!(images[1].layers.len(), 1);
    }

    #[test]
    fn basic_indices_reference_their_manifests_descriptors() {
        let indices = initialize_basic_indices();
        let index = &indices[0];
        assert_eq!(index.manifests.len(), 3);
        assert_eq!(index.index_manifest.manifests().len(), 3);
        for (image, descriptor) in index.manifests.iter().zip(index.index_manifest.manifests()) {
            assert_eq!(descriptor.digest(), &String::from(&image.digest));
        }
    }
}
