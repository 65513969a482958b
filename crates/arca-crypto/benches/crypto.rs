use arca_crypto::{encode_password, open_payload, seal_payload, Mnemonic, Secret};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

#[divan::bench]
fn bench_mnemonic_encode_decode(bencher: divan::Bencher) {
    let secret = Secret::from_bytes([0x5Au8; 32]);
    bencher.bench(|| {
        let mnemonic = Mnemonic::encode(divan::black_box(&secret));
        mnemonic.decode().is_valid()
    });
}

#[divan::bench]
fn bench_encode_password(bencher: divan::Bencher) {
    let material = Secret::from_bytes([0x5Au8; 32]).with_extra(b"ftp");
    bencher.bench(|| encode_password(divan::black_box(material.as_bytes()), 32).unwrap());
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_open_payload(bencher: divan::Bencher, size: usize) {
    let key = Secret::from_bytes([0x5Au8; 32]).stretched();
    let data = make_data(size);
    let blob = seal_payload(key.as_bytes(), 0xF8D5_7165, &data).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| open_payload(divan::black_box(key.as_bytes()), divan::black_box(&blob)).unwrap());
}

fn main() {
    divan::main();
}
