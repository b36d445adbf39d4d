use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use simulator::image_proc::add_gaussian_spot;
use simulator::{
    BlinkingKinetics, Camera, CameraConfig, FluorophoreProperties, GeneratorConfig,
    ImageGenerator,
};

fn make_camera(size: usize) -> Camera {
    Camera::new(CameraConfig {
        width_px: size,
        height_px: size,
        ..CameraConfig::default()
    })
    .expect("bench camera config is valid")
}

fn bench_camera_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("camera_render");
    for size in [64usize, 256, 1024] {
        let camera = make_camera(size);
        let photons = Array2::from_elem(camera.shape(), 25.0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        group.bench_function(format!("{size}x{size}"), |b| {
            b.iter(|| camera.render(black_box(&photons), &mut rng).unwrap())
        });
    }
    group.finish();
}

fn bench_add_gaussian_spot(c: &mut Criterion) {
    let mut image = Array2::<f64>::zeros((256, 256));
    c.bench_function("add_gaussian_spot_sigma_1.5", |b| {
        b.iter(|| add_gaussian_spot(&mut image, black_box(128.3), black_box(64.7), 500.0, 1.5))
    });
}

fn bench_next_image(c: &mut Criterion) {
    let props = FluorophoreProperties::new(300.0, 2.0, BlinkingKinetics::default())
        .expect("bench properties are valid");
    let config = GeneratorConfig {
        initial_activation_rate: 1.0,
        ..GeneratorConfig::default()
    };
    let mut generator =
        ImageGenerator::with_random_population(make_camera(64), props, 200, config)
            .expect("bench generator config is valid");

    c.bench_function("next_image_200_emitters_64x64", |b| {
        b.iter(|| {
            generator.next_image().unwrap();
        })
    });
}

criterion_group!(
    benches,
    bench_camera_render,
    bench_add_gaussian_spot,
    bench_next_image
);
criterion_main!(benches);
