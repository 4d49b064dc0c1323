//! End-to-end scenarios from spec §8, driven through the dispatcher so the
//! nonce/signature path is exercised alongside the manager logic.

use std::sync::Arc;

use libsecp256k1::SecretKey;
use num_traits::Zero;
use rand::rngs::StdRng;
use rand::SeedableRng;

use memoriae_node::dispatch::Node;
use memoriae_runtime::clock::FixedClock;
use memoriae_runtime::{Address, Amount};

struct Signer {
    secret: SecretKey,
    address: Address,
    nonce: u64,
}

impl Signer {
    fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let secret = SecretKey::random(&mut rng);
        let pubkey = libsecp256k1::PublicKey::from_secret_key(&secret);
        let address = memoriae_crypto::address_from_pubkey(&pubkey.serialize());
        Self { secret, address, nonce: 0 }
    }

    fn sign_next(&mut self) -> (u64, [u8; 65]) {
        let uid = self.nonce;
        let digest = memoriae_crypto::nonce_message(uid);
        let sig = memoriae_crypto::sign(&self.secret, &digest);
        self.nonce += 1;
        (uid, sig)
    }
}

fn setup() -> (Node, Signer) {
    let admin = Signer::new(1);
    let foundation = Address::from_bytes(&[0xFFu8; 20]);
    let clock = Arc::new(FixedClock::new(0));
    let node = Node::bootstrap_with_clock(admin.address, foundation, Amount::from(100u64), Amount::from(50u64), clock);
    (node, admin)
}

fn setup_at(now: i64) -> (Node, Signer, Arc<FixedClock>) {
    let admin = Signer::new(1);
    let foundation = Address::from_bytes(&[0xFFu8; 20]);
    let clock = Arc::new(FixedClock::new(now));
    let node = Node::bootstrap_with_clock(admin.address, foundation, Amount::from(100u64), Amount::from(50u64), clock.clone());
    (node, admin, clock)
}

/// Registers a one-keeper group (active as soon as the keeper joins), a
/// pledged provider, and a user recharged with `fund` of token 0. Returns
/// `(group, keeper_idx, user_idx, provider_idx, token)`.
fn setup_single_keeper_group(node: &Node, admin: &mut Signer, fund: &Amount) -> (usize, usize, usize, usize, Address) {
    let token = node.query_token_addresses()[0];
    let keeper_threshold = Amount::from(100u64);
    let provider_threshold = Amount::from(50u64);

    let (uid, sig) = admin.sign_next();
    let group = node.create_group(&admin.address, uid, &sig, 1).unwrap();

    let mut keeper = Signer::new(20);
    let (uid, sig) = admin.sign_next();
    node.transfer(&token, &admin.address, uid, &sig, &keeper.address, &keeper_threshold).unwrap();
    let (uid, sig) = keeper.sign_next();
    let keeper_idx = node.register(&keeper.address, uid, &sig, &keeper.address).unwrap();
    let (uid, sig) = keeper.sign_next();
    node.pledge(&keeper.address, uid, &sig, keeper_idx, &keeper_threshold).unwrap();
    let (uid, sig) = keeper.sign_next();
    node.register_keeper(&keeper.address, uid, &sig, keeper_idx, vec![]).unwrap();
    let (uid, sig) = keeper.sign_next();
    node.add_keeper_to_group(&keeper.address, uid, &sig, keeper_idx, group).unwrap();
    assert!(node.group_is_active(group));

    let mut provider = Signer::new(21);
    let (uid, sig) = admin.sign_next();
    node.transfer(&token, &admin.address, uid, &sig, &provider.address, &provider_threshold).unwrap();
    let (uid, sig) = provider.sign_next();
    let provider_idx = node.register(&provider.address, uid, &sig, &provider.address).unwrap();
    let (uid, sig) = provider.sign_next();
    node.pledge(&provider.address, uid, &sig, provider_idx, &provider_threshold).unwrap();
    let (uid, sig) = provider.sign_next();
    node.register_provider(&provider.address, uid, &sig, provider_idx, vec![]).unwrap();
    let (uid, sig) = provider.sign_next();
    node.add_provider_to_group(&provider.address, uid, &sig, provider_idx, group).unwrap();

    let mut user = Signer::new(22);
    let (uid, sig) = admin.sign_next();
    node.transfer(&token, &admin.address, uid, &sig, &user.address, fund).unwrap();
    let (uid, sig) = user.sign_next();
    let user_idx = node.register(&user.address, uid, &sig, &user.address).unwrap();
    let (uid, sig) = user.sign_next();
    node.register_user(&user.address, uid, &sig, user_idx, group, vec![]).unwrap();
    let (uid, sig) = user.sign_next();
    node.recharge(&user.address, uid, &sig, user_idx, 0, fund).unwrap();

    (group, keeper_idx, user_idx, provider_idx, token)
}

#[test]
fn scenario_1_token_creation_and_transfer() {
    let (node, mut admin) = setup();
    let u1 = Signer::new(2);
    let u2 = Signer::new(3);

    let tokens = node.query_token_addresses();
    let token = tokens[0];
    let total_supply = Amount::from(10u128.pow(28));
    assert_eq!(node.balance_of(&token, &admin.address), total_supply.clone());

    let (uid, sig) = admin.sign_next();
    node.transfer(&token, &admin.address, uid, &sig, &u1.address, &Amount::from(10u64.pow(8))).unwrap();
    assert_eq!(node.balance_of(&token, &u1.address), Amount::from(10u64.pow(8)));
    assert_eq!(node.balance_of(&token, &admin.address), &total_supply - &Amount::from(10u64.pow(8)));

    let mut u2m = u2;
    let (uid2, sig2) = u2m.sign_next();
    let err = node.transfer_from(&token, &u2m.address, uid2, &sig2, &u1.address, &u2m.address, &Amount::from(2 * 10u64.pow(7))).unwrap_err();
    assert_eq!(err.kind(), memoriae_runtime::ErrorKind::PermissionDenied);

    let mut u1m = u1;
    let (uid3, sig3) = u1m.sign_next();
    node.approve(&token, &u1m.address, uid3, &sig3, &u2m.address, &Amount::from(2 * 10u64.pow(7))).unwrap();

    let (uid4, sig4) = u2m.sign_next();
    node.transfer_from(&token, &u2m.address, uid4, &sig4, &u1m.address, &u2m.address, &Amount::from(2 * 10u64.pow(7))).unwrap();
    assert_eq!(node.balance_of(&token, &u1m.address), Amount::from(8 * 10u64.pow(7)));
    assert_eq!(node.balance_of(&token, &u2m.address), Amount::from(2 * 10u64.pow(7)));
}

#[test]
fn scenario_2_pledge_withdraw_round_trip() {
    let (node, mut admin) = setup();
    let mut u = Signer::new(4);

    let token = node.query_token_addresses()[0];
    let (uid, sig) = admin.sign_next();
    node.transfer(&token, &admin.address, uid, &sig, &u.address, &Amount::from(5_000u64)).unwrap();

    let (uid, sig) = u.sign_next();
    let idx = node.register(&u.address, uid, &sig, &u.address).unwrap();

    let (uid, sig) = u.sign_next();
    node.pledge(&u.address, uid, &sig, idx, &Amount::from(2_000u64)).unwrap();
    assert_eq!(node.balance_of(&token, &u.address), Amount::from(3_000u64));

    let (uid, sig) = u.sign_next();
    let sent = node.withdraw(&u.address, uid, &sig, idx, 0, &Amount::zero()).unwrap();
    assert_eq!(sent, Amount::from(2_000u64));
    assert_eq!(node.balance_of(&token, &u.address), Amount::from(5_000u64));
}

#[test]
fn scenario_3_keeper_group_becomes_active_at_seven() {
    let (node, mut admin) = setup();
    let threshold = Amount::from(100u64);
    let token = node.query_token_addresses()[0];

    let (uid, sig) = admin.sign_next();
    let group = node.create_group(&admin.address, uid, &sig, 7).unwrap();

    let mut keepers = Vec::new();
    for seed in 10..17u64 {
        let mut k = Signer::new(seed);
        let (uid, sig) = admin.sign_next();
        node.transfer(&token, &admin.address, uid, &sig, &k.address, &threshold).unwrap();

        let (uid, sig) = k.sign_next();
        let idx = node.register(&k.address, uid, &sig, &k.address).unwrap();

        let (uid, sig) = k.sign_next();
        node.pledge(&k.address, uid, &sig, idx, &threshold).unwrap();

        let (uid, sig) = k.sign_next();
        node.register_keeper(&k.address, uid, &sig, idx, vec![]).unwrap();

        let (uid, sig) = k.sign_next();
        node.add_keeper_to_group(&k.address, uid, &sig, idx, group).unwrap();
        keepers.push(k);
    }

    assert!(node.group_is_active(group));
}

#[test]
fn scenario_4_order_lifecycle() {
    let (node, mut admin, clock) = setup_at(864_000);
    let fund = Amount::from(10u128.pow(14));
    let (_group, keeper_idx, user_idx, provider_idx, _token) = setup_single_keeper_group(&node, &mut admin, &fund);

    let start = 863_810;
    let end = 950_400; // one day after `clock`'s start, and day-aligned.
    let sprice = Amount::from(600_000u64);
    let pay = &sprice * (end - start) as u64;
    let manage = &pay / 100u32 * 4u32;
    let tax = &pay / 100u32;
    let total = &pay + &manage + &tax;

    let before = node.fs_balance(user_idx, 0).unwrap();
    let (uid, sig) = admin.sign_next();
    node.add_order(&admin.address, uid, &sig, keeper_idx, user_idx, provider_idx, start, end, 300, 0, 0, &sprice).unwrap();

    assert_eq!(node.fs_balance(user_idx, 0).unwrap(), &before - &total);
    assert_eq!(node.settlement_of(provider_idx, 0).unwrap().unwrap().max_pay, pay);

    clock.set(end);
    let (uid, sig) = admin.sign_next();
    node.sub_order(&admin.address, uid, &sig, user_idx, provider_idx, start, end, 300, 0, 0, &sprice).unwrap();

    let (uid, sig) = admin.sign_next();
    let err = node.sub_order(&admin.address, uid, &sig, user_idx, provider_idx, start, end, 300, 0, 0, &sprice).unwrap_err();
    assert_eq!(err.kind(), memoriae_runtime::ErrorKind::NonceMismatch);
}

#[test]
fn scenario_5_pro_withdraw_with_loss() {
    let (node, mut admin, clock) = setup_at(864_000);
    let fund = Amount::from(10u128.pow(14));
    let (_group, keeper_idx, user_idx, provider_idx, _token) = setup_single_keeper_group(&node, &mut admin, &fund);
    let sprice = Amount::from(600_000u64);

    // Two token-0 orders, the second landing while the mint schedule's
    // accrued price is still nonzero, so the reward mint actually fires.
    let (uid, sig) = admin.sign_next();
    node.add_order(&admin.address, uid, &sig, keeper_idx, user_idx, provider_idx, 863_810, 950_400, 300, 0, 0, &sprice).unwrap();

    clock.set(871_200);
    let (uid, sig) = admin.sign_next();
    node.add_order(&admin.address, uid, &sig, keeper_idx, user_idx, provider_idx, 871_010, 950_400, 300, 1, 0, &sprice).unwrap();

    clock.set(900_000);
    let (uid, sig) = admin.sign_next();
    node.pro_withdraw(&admin.address, uid, &sig, provider_idx, 0, &Amount::from(1500u32), &Amount::from(240u32)).unwrap();

    let (uid, sig) = admin.sign_next();
    node.pro_withdraw(&admin.address, uid, &sig, provider_idx, 0, &Amount::from(1800u32), &Amount::from(450u32)).unwrap();

    let (uid, sig) = admin.sign_next();
    let err = node
        .pro_withdraw(&admin.address, uid, &sig, provider_idx, 0, &Amount::from(1900u32), &Amount::from(200u32))
        .unwrap_err();
    assert_eq!(err.kind(), memoriae_runtime::ErrorKind::Result);
}

#[test]
fn scenario_6_day_misaligned_order_is_rejected() {
    let (node, mut admin) = setup();
    let (uid, sig) = admin.sign_next();
    let err = node
        .add_order(&admin.address, uid, &sig, 0, 0, 0, 0, 100, 1, 0, 0, &Amount::from(1u32))
        .unwrap_err();
    assert_eq!(err.kind(), memoriae_runtime::ErrorKind::Input);
}

#[test]
fn nonce_reuse_is_rejected() {
    let (node, mut admin) = setup();
    let token = node.query_token_addresses()[0];
    let (uid, sig) = admin.sign_next();
    node.transfer(&token, &admin.address, uid, &sig, &Address::from_bytes(&[2u8; 20]), &Amount::from(1u32)).unwrap();

    // Replaying the same (uid, sig) must fail: the nonce table already advanced.
    let err = node.transfer(&token, &admin.address, uid, &sig, &Address::from_bytes(&[2u8; 20]), &Amount::from(1u32)).unwrap_err();
    assert_eq!(err.kind(), memoriae_runtime::ErrorKind::NonceMismatch);
}
