//! Protocol fee arithmetic.

use gavel_fixed::mul_div;
use gavel_types::FEE_DENOMINATOR;

/// Split gross proceeds into `(auctioneer, treasury)` portions.
///
/// The treasury takes `floor(funds * fee_bps / 10_000)`; the auctioneer the
/// remainder. Requires `fee_bps <= FEE_DENOMINATOR`, validated at creation.
pub fn fee_split(funds: u128, fee_bps: u16) -> (u128, u128) {
    let fee = mul_div(funds, fee_bps as u128, FEE_DENOMINATOR);
    (funds - fee, fee)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gavel_types::FIXED_ONE;

    #[test]
    fn test_fee_split_basis_points() {
        // 1.2e18 at 100 bps: 1.188e18 to the auctioneer, 0.012e18 fee.
        let funds = 12 * FIXED_ONE / 10;
        let (proceeds, fee) = fee_split(funds, 100);
        assert_eq!(fee, 12_000_000_000_000_000);
        assert_eq!(proceeds, 1_188_000_000_000_000_000);
        assert_eq!(proceeds + fee, funds);
    }

    #[test]
    fn test_fee_split_floors_toward_treasury() {
        let (proceeds, fee) = fee_split(999, 100);
        assert_eq!(fee, 9);
        assert_eq!(proceeds, 990);
    }

    #[test]
    fn test_fee_split_zero_and_full() {
        assert_eq!(fee_split(1_000, 0), (1_000, 0));
        assert_eq!(fee_split(1_000, 10_000), (0, 1_000));
    }
}
