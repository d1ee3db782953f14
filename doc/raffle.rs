//=====================================================================================================================
Raffle contract:

The service (off-chain) reads 4 methods and calls 1 method on the raffle contract

// number of raffles created so far, raffle ids are 1..=raffleCounter
- function raffleCounter() external view returns (uint256)

// raffle record
- function raffles(uint256) external view returns (uint256 numberOfEntries, uint256 commitmentHash, string month,
            bool isActive, uint256 createdAt, uint256 winnerIndex, address winnerAddress)

// winner of a raffle, hasWinner is false until the contract picks one
- function getWinnerByRaffleId(uint256 _raffleId) external view returns (address, uint256, string, bool)

// raffle record plus the eligible token ids
- function getRaffleDetails(uint256 _raffleId) external view returns (uint256, uint256, string, bool, uint256,
            uint256, address, string[])

// start a new raffle (admin key, gas 1000000, fire and forget)
- function startRaffle(string[] _nftIds, string _month) external


//=====================================================================================================================

Entries:

    1> For every eligible token id call the NFT API `getOwnersForNFT` (follow `pageKey`).
        - One entry per ownership record, an address owning N tokens appears N times.
        - Any failed lookup fails the whole request.

    2> Commitment hash.
        - sha256(concat(sort(entries))), lowercase hex.
        - Shuffle only changes the returned list, the hash always uses the sorted copy.

    3> Verify.
        - Re-fetch from token ids (preferred) or take the entries given by the caller.
        - Compare with the published hash, `0x` prefix and case ignored.


//=====================================================================================================================

Identity CSV:

    1> Upload (bearer gated): saved as discord_data_<millis>.csv, `latest` pointer rewritten.
    2> Lookup (bearer gated): case-insensitive match on the address column of the latest upload.
